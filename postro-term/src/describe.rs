//! Catalog commands: the `\d` family, `\l`, `\z`, `\dp` and `\lo_list`.
//!
//! Every command builds one catalog query from its pattern arguments and prints the rows as
//! a titled table. Patterns are checked before anything is sent, so a malformed pattern is
//! reported even without a connection. Queries target servers 12 and newer, with branches
//! where later releases renamed or added catalog columns.
use crate::{
    command::{CmdStatus, Context},
    pattern::{validate_name_pattern, NameColumns},
    print::{print_table, Align, Expanded, PrintOptions, Table},
    result::PgResult,
    scan::{quote_literal, OptionKind},
    session::Session,
    Error, Result,
};

const HIDE_SYSTEM: &str = "      AND n.nspname <> 'pg_catalog'\n      AND n.nspname <> 'information_schema'\n";
const HIDE_SYSTEM_WHERE: &str = "WHERE n.nspname <> 'pg_catalog'\n      AND n.nspname <> 'information_schema'\n";

fn qualified(schema: &'static str, name: &'static str, visibility: &'static str) -> NameColumns<'static> {
    NameColumns { schema: Some(schema), name: Some(name), alt_name: None, visibility: Some(visibility) }
}

fn unqualified(name: &'static str) -> NameColumns<'static> {
    NameColumns { name: Some(name), ..Default::default() }
}

/// `CASE` expression rendering an ACL array one grant per line.
fn acl_column(column: &str) -> String {
    format!(
        "CASE WHEN pg_catalog.array_length({column}, 1) = 0 THEN '(none)' \
         ELSE pg_catalog.array_to_string({column}, E'\\n') END AS \"Access privileges\""
    )
}

/// Option list of a foreign object as `(name 'value', ...)`.
fn options_column(column: &str, alias: &str) -> String {
    format!(
        "CASE WHEN {column} IS NULL THEN '' ELSE \
         '(' || pg_catalog.array_to_string(ARRAY(SELECT pg_catalog.quote_ident(option_name) || ' ' || \
         pg_catalog.quote_literal(option_value) FROM pg_catalog.pg_options_to_table({column})), ', ') || ')' \
         END AS \"{alias}\""
    )
}

/// Spellings the grammar accepts for built-in types, mapped to the names `format_type` prints.
fn map_type_name(pattern: Option<&str>) -> Option<String> {
    const MAP: &[(&str, &str)] = &[
        ("decimal", "numeric"),
        ("float", "double precision"),
        ("int", "integer"),
        ("bool[]", "boolean[]"),
        ("decimal[]", "numeric[]"),
        ("float[]", "double precision[]"),
        ("float4[]", "real[]"),
        ("float8[]", "double precision[]"),
        ("int[]", "integer[]"),
        ("int2[]", "smallint[]"),
        ("int4[]", "integer[]"),
        ("int8[]", "bigint[]"),
        ("time[]", "time without time zone[]"),
        ("timetz[]", "time with time zone[]"),
        ("timestamp[]", "timestamp without time zone[]"),
        ("timestamptz[]", "timestamp with time zone[]"),
        ("varbit[]", "bit varying[]"),
        ("varchar[]", "character varying[]"),
    ];
    let pattern = pattern?;
    let mapped = MAP.iter().find(|(from, _)| from.eq_ignore_ascii_case(pattern)).map(|(_, to)| *to);
    Some(mapped.unwrap_or(pattern).to_owned())
}

/// Split a command name into its base and the `+` and `S` modifiers.
fn split_modifiers(cmd: &str) -> (String, bool, bool) {
    let base = cmd.chars().filter(|c| !matches!(c, '+' | 'S')).collect();
    (base, cmd.contains('+'), cmd.contains('S'))
}

/// Relation kinds of `\dt`, `\di` and friends, `None` when `kinds` has other letters.
fn relation_kinds(kinds: &str) -> Option<&str> {
    kinds.chars().all(|c| "tivmsE".contains(c)).then_some(kinds)
}

/// `\d`-style command `cmd`, with the modifiers still attached.
pub fn exec_describe(cx: &mut Context<'_>, cmd: &str) -> Result<CmdStatus> {
    let (base, verbose, system) = split_modifiers(cmd);
    let pattern = cx.arg(OptionKind::Normal, true);
    let extra = match base.as_str() {
        "do" => cx.args(OptionKind::Normal),
        "drds" => cx.arg(OptionKind::Normal, true).into_iter().collect(),
        b if b.starts_with("df") => cx.args(OptionKind::Normal),
        _ => Vec::new(),
    };
    let pattern = pattern.as_deref();
    let mut d = Describe::new(cx.session, verbose, system);

    let ok = match base.as_str() {
        "d" => match pattern {
            Some(pattern) => d.describe_tables(pattern)?,
            None => d.list_relations("tvmsE", None)?,
        },
        "da" => d.list_aggregates(pattern)?,
        "dA" => d.list_access_methods(pattern)?,
        "db" => d.list_tablespaces(pattern)?,
        "dc" => d.list_conversions(pattern)?,
        "dconfig" => d.list_config(pattern)?,
        "dC" => d.list_casts(pattern)?,
        "dd" => d.list_descriptions(pattern)?,
        "ddp" => d.list_default_acls(pattern)?,
        "dD" => d.list_domains(pattern)?,
        "des" => d.list_foreign_servers(pattern)?,
        "det" => d.list_foreign_tables(pattern)?,
        "deu" => d.list_user_mappings(pattern)?,
        "dew" => d.list_fdws(pattern)?,
        "dF" => d.list_ts_configs(pattern)?,
        "dFd" => d.list_ts_dictionaries(pattern)?,
        "dFp" => d.list_ts_parsers(pattern)?,
        "dFt" => d.list_ts_templates(pattern)?,
        "dg" | "du" => d.list_roles(pattern)?,
        "dl" | "lo_list" => d.list_large_objects()?,
        "dL" => d.list_languages(pattern)?,
        "dn" => d.list_schemas(pattern)?,
        "do" => d.list_operators(pattern, &extra)?,
        "dO" => d.list_collations(pattern)?,
        "dp" | "z" => d.list_privileges(pattern)?,
        "drds" => d.list_role_settings(pattern, extra.first().map(String::as_str))?,
        "drg" => d.list_role_grants(pattern)?,
        "dRp" => d.list_publications(pattern)?,
        "dRs" => d.list_subscriptions(pattern)?,
        "dT" => d.list_types(pattern)?,
        "dx" if verbose => d.list_extension_contents(pattern)?,
        "dx" => d.list_extensions(pattern)?,
        "dX" => d.list_extended_stats(pattern)?,
        "dy" => d.list_event_triggers(pattern)?,
        "l" => d.list_databases(pattern)?,
        b if b.starts_with("df") => d.list_functions(&b[2..], pattern, &extra)?,
        b => match b.strip_prefix('d').and_then(relation_kinds) {
            Some(kinds) => d.list_relations(kinds, pattern)?,
            None => return Ok(CmdStatus::Unknown),
        },
    };
    Ok(if ok { CmdStatus::SkipLine } else { CmdStatus::Error })
}

/// `\l` and `-l`.
pub fn list_databases(session: &mut Session, verbose: bool) -> Result<bool> {
    Describe::new(session, verbose, false).list_databases(None)
}

struct Describe<'s> {
    session: &'s mut Session,
    verbose: bool,
    system: bool,
    /// Server version, 0 when unknown.
    sversion: u32,
}

impl<'s> Describe<'s> {
    fn new(session: &'s mut Session, verbose: bool, system: bool) -> Describe<'s> {
        let sversion = session.conn.as_ref().and_then(|conn| conn.server_version_num()).unwrap_or(0);
        Describe { session, verbose, system, sversion }
    }

    fn at_least(&self, version: u32) -> bool {
        self.sversion == 0 || self.sversion >= version
    }

    /// Whether system objects are hidden for this `pattern`.
    fn hide_system(&self, pattern: Option<&str>) -> bool {
        !self.system && pattern.is_none()
    }

    fn pattern(
        &self,
        sql: &mut String,
        pattern: Option<&str>,
        have_where: bool,
        cols: NameColumns<'_>,
        max_parts: usize,
    ) -> Result<bool> {
        let current_db = self.session.conn.as_ref().map(|conn| conn.dbname());
        validate_name_pattern(sql, pattern, have_where, false, cols, max_parts, current_db)
    }

    fn query(&mut self, sql: &str) -> Result<Option<PgResult>> {
        self.session.exec_internal(sql)
    }

    fn render(&mut self, table: &Table, opt: &PrintOptions) -> Result<()> {
        let mut buf = Vec::new();
        print_table(table, opt, &mut buf, self.session.out.is_terminal())?;
        self.session.write_paged(&String::from_utf8_lossy(&buf), None)
    }

    fn print(&mut self, result: &PgResult, title: &str, footers: Vec<String>) -> Result<()> {
        let opt = self.session.popt.clone();
        let mut table = result.to_table(&opt, Some(title.to_owned()));
        for footer in footers {
            table.add_footer(footer);
        }
        self.render(&table, &opt)
    }

    /// Run `sql` and print every row under `title`.
    fn list(&mut self, sql: &str, title: &str) -> Result<bool> {
        if let Some(result) = self.query(sql)? {
            self.print(&result, title, Vec::new())?;
        }
        Ok(true)
    }

    fn not_found(&mut self, message: String) -> Result<bool> {
        if !self.session.quiet() {
            self.session.error(message);
        }
        Ok(true)
    }

    // \da
    fn list_aggregates(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT n.nspname as \"Schema\",\n\
             \x20 p.proname AS \"Name\",\n\
             \x20 pg_catalog.format_type(p.prorettype, NULL) AS \"Result data type\",\n\
             \x20 CASE WHEN p.pronargs = 0\n\
             \x20   THEN CAST('*' AS pg_catalog.text)\n\
             \x20   ELSE pg_catalog.pg_get_function_arguments(p.oid)\n\
             \x20 END AS \"Argument data types\",\n\
             \x20 pg_catalog.obj_description(p.oid, 'pg_proc') as \"Description\"\n\
             FROM pg_catalog.pg_proc p\n\
             \x20    LEFT JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace\n\
             WHERE p.prokind = 'a'\n",
        );
        if self.hide_system(pattern) {
            sql.push_str(HIDE_SYSTEM);
        }
        let cols = qualified("n.nspname", "p.proname", "pg_catalog.pg_function_is_visible(p.oid)");
        self.pattern(&mut sql, pattern, true, cols, 3)?;
        sql.push_str("ORDER BY 1, 2, 4;");
        self.list(&sql, "List of aggregate functions")
    }

    // \dA
    fn list_access_methods(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT amname AS \"Name\",\n\
             \x20 CASE amtype WHEN 'i' THEN 'Index' WHEN 't' THEN 'Table' END AS \"Type\"",
        );
        if self.verbose {
            sql.push_str(
                ",\n  amhandler AS \"Handler\",\n  pg_catalog.obj_description(oid, 'pg_am') AS \"Description\"",
            );
        }
        sql.push_str("\nFROM pg_catalog.pg_am\n");
        self.pattern(&mut sql, pattern, false, unqualified("amname"), 1)?;
        sql.push_str("ORDER BY 1;");
        self.list(&sql, "List of access methods")
    }

    // \db
    fn list_tablespaces(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT spcname AS \"Name\",\n\
             \x20 pg_catalog.pg_get_userbyid(spcowner) AS \"Owner\",\n\
             \x20 pg_catalog.pg_tablespace_location(oid) AS \"Location\"",
        );
        if self.verbose {
            sql.push_str(",\n  ");
            sql.push_str(&acl_column("spcacl"));
            sql.push_str(
                ",\n  spcoptions AS \"Options\"\
                 ,\n  pg_catalog.pg_size_pretty(pg_catalog.pg_tablespace_size(oid)) AS \"Size\"\
                 ,\n  pg_catalog.shobj_description(oid, 'pg_tablespace') AS \"Description\"",
            );
        }
        sql.push_str("\nFROM pg_catalog.pg_tablespace\n");
        self.pattern(&mut sql, pattern, false, unqualified("spcname"), 1)?;
        sql.push_str("ORDER BY 1;");
        self.list(&sql, "List of tablespaces")
    }

    /// Conditions matching the argument types of `\df` and `\do`, `-` means no argument.
    fn argument_patterns(&self, sql: &mut String, args: &[String]) -> Result<()> {
        for (i, arg) in args.iter().enumerate() {
            if arg == "-" {
                sql.push_str(&format!("  AND t{i}.typname IS NULL\n"));
                continue;
            }
            let (nsp, typ, fmt, vis) = (
                format!("nt{i}.nspname"),
                format!("t{i}.typname"),
                format!("pg_catalog.format_type(t{i}.oid, NULL)"),
                format!("pg_catalog.pg_type_is_visible(t{i}.oid)"),
            );
            let cols = NameColumns { schema: Some(&nsp), name: Some(&typ), alt_name: Some(&fmt), visibility: Some(&vis) };
            self.pattern(sql, map_type_name(Some(arg)).as_deref(), true, cols, 3)?;
        }
        Ok(())
    }

    // \df
    fn list_functions(&mut self, kinds: &str, pattern: Option<&str>, args: &[String]) -> Result<bool> {
        if !kinds.chars().all(|c| "anptw".contains(c)) {
            return Err(Error::usage("\\df only takes [anptwS+] as options"));
        }
        let all = kinds.is_empty();
        let [agg, normal, procedure, trigger, window] =
            ['a', 'n', 'p', 't', 'w'].map(|kind| all || kinds.contains(kind));

        let mut sql = String::from(
            "SELECT n.nspname as \"Schema\",\n\
             \x20 p.proname as \"Name\",\n\
             \x20 pg_catalog.pg_get_function_result(p.oid) as \"Result data type\",\n\
             \x20 pg_catalog.pg_get_function_arguments(p.oid) as \"Argument data types\",\n\
             \x20CASE p.prokind\n\
             \x20 WHEN 'a' THEN 'agg'\n\
             \x20 WHEN 'w' THEN 'window'\n\
             \x20 WHEN 'p' THEN 'proc'\n\
             \x20 ELSE 'func'\n\
             \x20END as \"Type\"",
        );
        if self.verbose {
            sql.push_str(
                ",\n CASE\n\
                 \x20 WHEN p.provolatile = 'i' THEN 'immutable'\n\
                 \x20 WHEN p.provolatile = 's' THEN 'stable'\n\
                 \x20 WHEN p.provolatile = 'v' THEN 'volatile'\n\
                 \x20END as \"Volatility\"\
                 ,\n CASE\n\
                 \x20 WHEN p.proparallel = 'r' THEN 'restricted'\n\
                 \x20 WHEN p.proparallel = 's' THEN 'safe'\n\
                 \x20 WHEN p.proparallel = 'u' THEN 'unsafe'\n\
                 \x20END as \"Parallel\"\
                 ,\n pg_catalog.pg_get_userbyid(p.proowner) as \"Owner\"\
                 ,\n CASE WHEN prosecdef THEN 'definer' ELSE 'invoker' END AS \"Security\"\
                 ,\n CASE WHEN p.proleakproof THEN 'yes' ELSE 'no' END as \"Leakproof?\",\n ",
            );
            sql.push_str(&acl_column("p.proacl"));
            sql.push_str(
                ",\n l.lanname as \"Language\"\
                 ,\n CASE WHEN l.lanname IN ('internal', 'c') THEN p.prosrc END as \"Internal name\"\
                 ,\n pg_catalog.obj_description(p.oid, 'pg_proc') as \"Description\"",
            );
        }
        sql.push_str(
            "\nFROM pg_catalog.pg_proc p\n     LEFT JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace\n",
        );
        for i in 0..args.len() {
            sql.push_str(&format!(
                "     LEFT JOIN pg_catalog.pg_type t{i} ON t{i}.oid = p.proargtypes[{i}]\n\
                 \x20    LEFT JOIN pg_catalog.pg_namespace nt{i} ON nt{i}.oid = t{i}.typnamespace\n"
            ));
        }
        if self.verbose {
            sql.push_str("     LEFT JOIN pg_catalog.pg_language l ON l.oid = p.prolang\n");
        }

        let mut have_where = false;
        if agg && normal && procedure && trigger && window {
        } else if normal {
            let mut exclude = Vec::new();
            if !agg {
                exclude.push("p.prokind <> 'a'\n");
            }
            if !procedure {
                exclude.push("p.prokind <> 'p'\n");
            }
            if !trigger {
                exclude.push("p.prorettype <> 'pg_catalog.trigger'::pg_catalog.regtype\n");
            }
            if !window {
                exclude.push("p.prokind <> 'w'\n");
            }
            for cond in exclude {
                sql.push_str(if have_where { "      AND " } else { "WHERE " });
                sql.push_str(cond);
                have_where = true;
            }
        } else {
            let mut include = Vec::new();
            if agg {
                include.push("p.prokind = 'a'\n");
            }
            if trigger {
                include.push("p.prorettype = 'pg_catalog.trigger'::pg_catalog.regtype\n");
            }
            if procedure {
                include.push("p.prokind = 'p'\n");
            }
            if window {
                include.push("p.prokind = 'w'\n");
            }
            sql.push_str("WHERE (\n       ");
            sql.push_str(&include.join("       OR "));
            sql.push_str("      )\n");
            have_where = true;
        }

        let cols = qualified("n.nspname", "p.proname", "pg_catalog.pg_function_is_visible(p.oid)");
        let added = self.pattern(&mut sql, pattern, have_where, cols, 3)?;
        self.argument_patterns(&mut sql, args)?;
        if self.hide_system(pattern) {
            if have_where || added {
                sql.push_str(HIDE_SYSTEM);
            } else {
                sql.push_str(HIDE_SYSTEM_WHERE);
            }
        }
        sql.push_str("ORDER BY 1, 2, 4;");
        self.list(&sql, "List of functions")
    }

    // \dT
    fn list_types(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT n.nspname as \"Schema\",\n  pg_catalog.format_type(t.oid, NULL) AS \"Name\",\n",
        );
        if self.verbose {
            sql.push_str(
                "  t.typname AS \"Internal name\",\n\
                 \x20 CASE WHEN t.typrelid != 0\n\
                 \x20     THEN CAST('tuple' AS pg_catalog.text)\n\
                 \x20   WHEN t.typlen < 0\n\
                 \x20     THEN CAST('var' AS pg_catalog.text)\n\
                 \x20   ELSE CAST(t.typlen AS pg_catalog.text)\n\
                 \x20 END AS \"Size\",\n\
                 \x20 pg_catalog.array_to_string(\n\
                 \x20     ARRAY(\n\
                 \x20         SELECT e.enumlabel\n\
                 \x20         FROM pg_catalog.pg_enum e\n\
                 \x20         WHERE e.enumtypid = t.oid\n\
                 \x20         ORDER BY e.enumsortorder\n\
                 \x20     ),\n\
                 \x20     E'\\n'\n\
                 \x20 ) AS \"Elements\",\n\
                 \x20 pg_catalog.pg_get_userbyid(t.typowner) AS \"Owner\",\n",
            );
            sql.push_str(&acl_column("t.typacl"));
            sql.push_str(",\n  ");
        }
        sql.push_str(
            "  pg_catalog.obj_description(t.oid, 'pg_type') as \"Description\"\n\
             FROM pg_catalog.pg_type t\n\
             \x20    LEFT JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace\n\
             WHERE (t.typrelid = 0 OR (SELECT c.relkind = 'c' FROM pg_catalog.pg_class c WHERE c.oid = t.typrelid))\n",
        );
        if !pattern.is_some_and(|p| p.contains("[]")) {
            sql.push_str(
                "  AND NOT EXISTS(SELECT 1 FROM pg_catalog.pg_type el WHERE el.oid = t.typelem AND el.typarray = t.oid)\n",
            );
        }
        if self.hide_system(pattern) {
            sql.push_str(HIDE_SYSTEM);
        }
        let cols = NameColumns {
            schema: Some("n.nspname"),
            name: Some("t.typname"),
            alt_name: Some("pg_catalog.format_type(t.oid, NULL)"),
            visibility: Some("pg_catalog.pg_type_is_visible(t.oid)"),
        };
        self.pattern(&mut sql, map_type_name(pattern).as_deref(), true, cols, 3)?;
        sql.push_str("ORDER BY 1, 2;");
        self.list(&sql, "List of data types")
    }

    // \do
    fn list_operators(&mut self, pattern: Option<&str>, args: &[String]) -> Result<bool> {
        let args = &args[..args.len().min(2)];
        let mut sql = String::from(
            "SELECT n.nspname as \"Schema\",\n\
             \x20 o.oprname AS \"Name\",\n\
             \x20 CASE WHEN o.oprkind='l' THEN NULL ELSE pg_catalog.format_type(o.oprleft, NULL) END AS \"Left arg type\",\n\
             \x20 CASE WHEN o.oprkind='r' THEN NULL ELSE pg_catalog.format_type(o.oprright, NULL) END AS \"Right arg type\",\n\
             \x20 pg_catalog.format_type(o.oprresult, NULL) AS \"Result type\",\n",
        );
        if self.verbose {
            sql.push_str(
                "  o.oprcode AS \"Function\",\n\
                 \x20 CASE WHEN p.proleakproof THEN 'yes' ELSE 'no' END AS \"Leakproof?\",\n",
            );
        }
        sql.push_str(
            "  coalesce(pg_catalog.obj_description(o.oid, 'pg_operator'),\n\
             \x20          pg_catalog.obj_description(o.oprcode, 'pg_proc')) AS \"Description\"\n\
             FROM pg_catalog.pg_operator o\n\
             \x20    LEFT JOIN pg_catalog.pg_namespace n ON n.oid = o.oprnamespace\n",
        );
        match args.len() {
            2 => sql.push_str(
                "     LEFT JOIN pg_catalog.pg_type t0 ON t0.oid = o.oprleft\n\
                 \x20    LEFT JOIN pg_catalog.pg_namespace nt0 ON nt0.oid = t0.typnamespace\n\
                 \x20    LEFT JOIN pg_catalog.pg_type t1 ON t1.oid = o.oprright\n\
                 \x20    LEFT JOIN pg_catalog.pg_namespace nt1 ON nt1.oid = t1.typnamespace\n",
            ),
            1 => sql.push_str(
                "     LEFT JOIN pg_catalog.pg_type t0 ON t0.oid = o.oprright\n\
                 \x20    LEFT JOIN pg_catalog.pg_namespace nt0 ON nt0.oid = t0.typnamespace\n",
            ),
            _ => {}
        }
        if self.verbose {
            sql.push_str("     LEFT JOIN pg_catalog.pg_proc p ON p.oid = o.oprcode\n");
        }
        let hide = self.hide_system(pattern);
        if hide {
            sql.push_str(HIDE_SYSTEM_WHERE);
        }
        // operator names are matched literally, `*` and `?` are operator characters
        let cols = qualified("n.nspname", "o.oprname", "pg_catalog.pg_operator_is_visible(o.oid)");
        let current_db = self.session.conn.as_ref().map(|conn| conn.dbname());
        let added = validate_name_pattern(&mut sql, pattern, hide, true, cols, 3, current_db)?;
        if args.len() == 1 {
            sql.push_str(if hide || added { "  AND o.oprleft = 0\n" } else { "WHERE o.oprleft = 0\n" });
        }
        self.argument_patterns(&mut sql, args)?;
        sql.push_str("ORDER BY 1, 2, 3, 4;");
        self.list(&sql, "List of operators")
    }

    // \l
    fn list_databases(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT\n\
             \x20 d.datname as \"Name\",\n\
             \x20 pg_catalog.pg_get_userbyid(d.datdba) as \"Owner\",\n\
             \x20 pg_catalog.pg_encoding_to_char(d.encoding) as \"Encoding\",\n",
        );
        sql.push_str(if self.at_least(150000) {
            "  CASE d.datlocprovider WHEN 'b' THEN 'builtin' WHEN 'c' THEN 'libc' WHEN 'i' THEN 'icu' END AS \"Locale Provider\",\n"
        } else {
            "  'libc' AS \"Locale Provider\",\n"
        });
        sql.push_str("  d.datcollate as \"Collate\",\n  d.datctype as \"Ctype\",\n");
        sql.push_str(if self.at_least(170000) {
            "  d.datlocale as \"Locale\",\n"
        } else if self.at_least(150000) {
            "  d.daticulocale as \"Locale\",\n"
        } else {
            "  NULL as \"Locale\",\n"
        });
        sql.push_str(if self.at_least(160000) {
            "  d.daticurules as \"ICU Rules\",\n"
        } else {
            "  NULL as \"ICU Rules\",\n"
        });
        sql.push_str("  ");
        sql.push_str(&acl_column("d.datacl"));
        if self.verbose {
            sql.push_str(
                ",\n  CASE WHEN pg_catalog.has_database_privilege(d.datname, 'CONNECT')\n\
                 \x20      THEN pg_catalog.pg_size_pretty(pg_catalog.pg_database_size(d.datname))\n\
                 \x20      ELSE 'No Access'\n\
                 \x20 END as \"Size\"\
                 ,\n  t.spcname as \"Tablespace\"\
                 ,\n  pg_catalog.shobj_description(d.oid, 'pg_database') as \"Description\"",
            );
        }
        sql.push_str("\nFROM pg_catalog.pg_database d\n");
        if self.verbose {
            sql.push_str("  JOIN pg_catalog.pg_tablespace t on d.dattablespace = t.oid\n");
        }
        if pattern.is_some() {
            self.pattern(&mut sql, pattern, false, unqualified("d.datname"), 1)?;
        }
        sql.push_str("ORDER BY 1;");
        self.list(&sql, "List of databases")
    }

    // \dp and \z
    fn list_privileges(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT n.nspname as \"Schema\",\n\
             \x20 c.relname as \"Name\",\n\
             \x20 CASE c.relkind WHEN 'r' THEN 'table' WHEN 'v' THEN 'view' WHEN 'm' THEN 'materialized view' \
             WHEN 'S' THEN 'sequence' WHEN 'f' THEN 'foreign table' WHEN 'p' THEN 'partitioned table' END as \"Type\",\n  ",
        );
        sql.push_str(&acl_column("c.relacl"));
        sql.push_str(
            ",\n  pg_catalog.array_to_string(ARRAY(\n\
             \x20   SELECT attname || E':\\n  ' || pg_catalog.array_to_string(attacl, E'\\n  ')\n\
             \x20   FROM pg_catalog.pg_attribute a\n\
             \x20   WHERE attrelid = c.oid AND NOT attisdropped AND attacl IS NOT NULL\n\
             \x20 ), E'\\n') AS \"Column privileges\"\
             ,\n  pg_catalog.array_to_string(ARRAY(\n\
             \x20   SELECT polname\n\
             \x20   || CASE WHEN NOT polpermissive THEN\n\
             \x20      E' (RESTRICTIVE)'\n\
             \x20      ELSE '' END\n\
             \x20   || CASE WHEN polcmd != '*' THEN\n\
             \x20          E' (' || polcmd::pg_catalog.text || E'):'\n\
             \x20      ELSE E':'\n\
             \x20      END\n\
             \x20   || CASE WHEN polqual IS NOT NULL THEN\n\
             \x20          E'\\n  (u): ' || pg_catalog.pg_get_expr(polqual, polrelid)\n\
             \x20      ELSE E''\n\
             \x20      END\n\
             \x20   || CASE WHEN polwithcheck IS NOT NULL THEN\n\
             \x20          E'\\n  (c): ' || pg_catalog.pg_get_expr(polwithcheck, polrelid)\n\
             \x20      ELSE E''\n\
             \x20      END\
             \x20   || CASE WHEN polroles <> '{0}' THEN\n\
             \x20          E'\\n  to: ' || pg_catalog.array_to_string(\n\
             \x20              ARRAY(\n\
             \x20                  SELECT rolname\n\
             \x20                  FROM pg_catalog.pg_roles\n\
             \x20                  WHERE oid = ANY (polroles)\n\
             \x20                  ORDER BY 1\n\
             \x20              ), E', ')\n\
             \x20      ELSE E''\n\
             \x20      END\n\
             \x20   FROM pg_catalog.pg_policy pol\n\
             \x20   WHERE polrelid = c.oid), E'\\n')\n\
             \x20   AS \"Policies\"\n\
             FROM pg_catalog.pg_class c\n\
             \x20    LEFT JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace\n\
             WHERE c.relkind IN ('r','v','m','S','f','p')\n",
        );
        if self.hide_system(pattern) {
            sql.push_str(HIDE_SYSTEM);
        }
        let cols = qualified("n.nspname", "c.relname", "pg_catalog.pg_table_is_visible(c.oid)");
        self.pattern(&mut sql, pattern, true, cols, 3)?;
        sql.push_str("ORDER BY 1, 2;");
        self.list(&sql, "Access privileges")
    }

    // \ddp
    fn list_default_acls(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT pg_catalog.pg_get_userbyid(d.defaclrole) AS \"Owner\",\n\
             \x20 n.nspname AS \"Schema\",\n\
             \x20 CASE d.defaclobjtype WHEN 'r' THEN 'table' WHEN 'S' THEN 'sequence' WHEN 'f' THEN 'function' \
             WHEN 'T' THEN 'type' WHEN 'n' THEN 'schema' WHEN 'L' THEN 'large object' END AS \"Type\",\n  ",
        );
        sql.push_str(&acl_column("d.defaclacl"));
        sql.push_str(
            "\nFROM pg_catalog.pg_default_acl d\n\
             \x20    LEFT JOIN pg_catalog.pg_namespace n ON n.oid = d.defaclnamespace\n",
        );
        let cols = NameColumns {
            name: Some("n.nspname"),
            alt_name: Some("pg_catalog.pg_get_userbyid(d.defaclrole)"),
            ..Default::default()
        };
        self.pattern(&mut sql, pattern, false, cols, 3)?;
        sql.push_str("ORDER BY 1, 2, 3;");
        self.list(&sql, "Default access privileges")
    }

    // \dd
    fn list_descriptions(&mut self, pattern: Option<&str>) -> Result<bool> {
        let hide = self.hide_system(pattern);
        let mut sql = String::from(
            "SELECT DISTINCT tt.nspname AS \"Schema\", tt.name AS \"Name\", tt.object AS \"Object\", d.description AS \"Description\"\n\
             FROM (\n",
        );

        // (select list, hide clause, name column, visibility, whether a WHERE is already open)
        let parts: [(&str, &str, &'static str, &'static str, bool); 6] = [
            (
                "  SELECT pgc.oid as oid, pgc.tableoid AS tableoid,\n  n.nspname as nspname,\n\
                 \x20 CAST(pgc.conname AS pg_catalog.text) as name,  CAST('table constraint' AS pg_catalog.text) as object\n\
                 \x20 FROM pg_catalog.pg_constraint pgc\n    JOIN pg_catalog.pg_class c ON c.oid = pgc.conrelid\n\
                 \x20   LEFT JOIN pg_catalog.pg_namespace n     ON n.oid = c.relnamespace\n",
                HIDE_SYSTEM_WHERE,
                "pgc.conname",
                "pg_catalog.pg_table_is_visible(c.oid)",
                false,
            ),
            (
                "UNION ALL\n  SELECT pgc.oid as oid, pgc.tableoid AS tableoid,\n  n.nspname as nspname,\n\
                 \x20 CAST(pgc.conname AS pg_catalog.text) as name,  CAST('domain constraint' AS pg_catalog.text) as object\n\
                 \x20 FROM pg_catalog.pg_constraint pgc\n    JOIN pg_catalog.pg_type t ON t.oid = pgc.contypid\n\
                 \x20   LEFT JOIN pg_catalog.pg_namespace n     ON n.oid = t.typnamespace\n",
                HIDE_SYSTEM_WHERE,
                "pgc.conname",
                "pg_catalog.pg_type_is_visible(t.oid)",
                false,
            ),
            (
                "UNION ALL\n  SELECT o.oid as oid, o.tableoid as tableoid,\n  n.nspname as nspname,\n\
                 \x20 CAST(o.opcname AS pg_catalog.text) as name,\n  CAST('operator class' AS pg_catalog.text) as object\n\
                 \x20 FROM pg_catalog.pg_opclass o\n    JOIN pg_catalog.pg_am am ON o.opcmethod = am.oid\n\
                 \x20   JOIN pg_catalog.pg_namespace n ON n.oid = o.opcnamespace\n",
                HIDE_SYSTEM,
                "o.opcname",
                "pg_catalog.pg_opclass_is_visible(o.oid)",
                true,
            ),
            (
                "UNION ALL\n  SELECT opf.oid as oid, opf.tableoid as tableoid,\n  n.nspname as nspname,\n\
                 \x20 CAST(opf.opfname AS pg_catalog.text) AS name,\n  CAST('operator family' AS pg_catalog.text) as object\n\
                 \x20 FROM pg_catalog.pg_opfamily opf\n    JOIN pg_catalog.pg_am am ON opf.opfmethod = am.oid\n\
                 \x20   JOIN pg_catalog.pg_namespace n ON opf.opfnamespace = n.oid\n",
                HIDE_SYSTEM,
                "opf.opfname",
                "pg_catalog.pg_opfamily_is_visible(opf.oid)",
                true,
            ),
            (
                "UNION ALL\n  SELECT r.oid as oid, r.tableoid as tableoid,\n  n.nspname as nspname,\n\
                 \x20 CAST(r.rulename AS pg_catalog.text) as name,  CAST('rule' AS pg_catalog.text) as object\n\
                 \x20 FROM pg_catalog.pg_rewrite r\n       JOIN pg_catalog.pg_class c ON c.oid = r.ev_class\n\
                 \x20      LEFT JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace\n\
                 \x20 WHERE r.rulename != '_RETURN'\n",
                HIDE_SYSTEM,
                "r.rulename",
                "pg_catalog.pg_table_is_visible(c.oid)",
                true,
            ),
            (
                "UNION ALL\n  SELECT t.oid as oid, t.tableoid as tableoid,\n  n.nspname as nspname,\n\
                 \x20 CAST(t.tgname AS pg_catalog.text) as name,  CAST('trigger' AS pg_catalog.text) as object\n\
                 \x20 FROM pg_catalog.pg_trigger t\n       JOIN pg_catalog.pg_class c ON c.oid = t.tgrelid\n\
                 \x20      LEFT JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace\n",
                HIDE_SYSTEM_WHERE,
                "t.tgname",
                "pg_catalog.pg_table_is_visible(c.oid)",
                false,
            ),
        ];
        for (select, hide_clause, name, visibility, where_open) in parts {
            sql.push_str(select);
            if hide {
                sql.push_str(hide_clause);
            }
            let cols = qualified("n.nspname", name, visibility);
            self.pattern(&mut sql, pattern, where_open || hide, cols, 3)?;
        }
        sql.push_str(
            ") AS tt\n  JOIN pg_catalog.pg_description d ON (tt.oid = d.objoid AND tt.tableoid = d.classoid AND d.objsubid = 0)\n\
             ORDER BY 1, 2, 3;",
        );
        self.list(&sql, "Object descriptions")
    }

    // \du and \dg
    fn list_roles(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT r.rolname, r.rolsuper, r.rolinherit,\n\
             \x20 r.rolcreaterole, r.rolcreatedb, r.rolcanlogin,\n\
             \x20 r.rolconnlimit, r.rolvaliduntil,\n\
             \x20 r.rolreplication, r.rolbypassrls",
        );
        if self.verbose {
            sql.push_str("\n, pg_catalog.shobj_description(r.oid, 'pg_authid') AS description");
        }
        sql.push_str("\nFROM pg_catalog.pg_roles r\n");
        if self.hide_system(pattern) {
            sql.push_str("WHERE r.rolname !~ '^pg_'\n");
        }
        self.pattern(&mut sql, pattern, false, unqualified("r.rolname"), 1)?;
        sql.push_str("ORDER BY 1;");
        let Some(result) = self.query(&sql)? else {
            return Ok(true);
        };

        let mut table = Table::new(Some("List of roles".into()));
        table.add_header("Role name", Align::Left);
        table.add_header("Attributes", Align::Left);
        if self.verbose {
            table.add_header("Description", Align::Left);
        }
        for row in 0..result.ntuples() {
            let flag = |col: usize| result.get(row, col) == "t";
            let mut attrs = Vec::new();
            let named = [
                (flag(1), "Superuser"),
                (!flag(2), "No inheritance"),
                (flag(3), "Create role"),
                (flag(4), "Create DB"),
                (!flag(5), "Cannot login"),
                (flag(8), "Replication"),
                (flag(9), "Bypass RLS"),
            ];
            for (set, name) in named {
                if set {
                    attrs.push(name.to_owned());
                }
            }
            let mut text = attrs.join(", ");
            let conns: i64 = result.get(row, 6).parse().unwrap_or(-1);
            if conns >= 0 {
                if !text.is_empty() {
                    text.push('\n');
                }
                match conns {
                    0 => text.push_str("No connections"),
                    1 => text.push_str("1 connection"),
                    n => text.push_str(&format!("{n} connections")),
                }
            }
            let valid_until = result.get(row, 7);
            if !valid_until.is_empty() {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&format!("Password valid until {valid_until}"));
            }
            let mut cells = vec![result.get(row, 0).to_owned(), text];
            if self.verbose {
                cells.push(result.get(row, 10).to_owned());
            }
            table.add_row(cells);
        }

        let mut opt = self.session.popt.clone();
        opt.default_footer = false;
        self.render(&table, &opt)?;
        Ok(true)
    }

    // \drds
    fn list_role_settings(&mut self, role: Option<&str>, database: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT rolname AS \"Role\", datname AS \"Database\",\n\
             pg_catalog.array_to_string(setconfig, E'\\n') AS \"Settings\"\n\
             FROM pg_catalog.pg_db_role_setting s\n\
             LEFT JOIN pg_catalog.pg_database d ON d.oid = setdatabase\n\
             LEFT JOIN pg_catalog.pg_roles r ON r.oid = setrole\n",
        );
        let have_where = self.pattern(&mut sql, role, false, unqualified("r.rolname"), 1)?;
        self.pattern(&mut sql, database, have_where, unqualified("d.datname"), 1)?;
        sql.push_str("ORDER BY 1, 2;");
        let Some(result) = self.query(&sql)? else {
            return Ok(true);
        };
        if result.ntuples() == 0 {
            return self.not_found(match (role, database) {
                (Some(role), Some(db)) => {
                    format!("Did not find any settings for role \"{role}\" and database \"{db}\".")
                }
                (Some(role), None) => format!("Did not find any settings for role \"{role}\"."),
                _ => "Did not find any settings.".into(),
            });
        }
        self.print(&result, "List of settings", Vec::new())?;
        Ok(true)
    }

    // \drg
    fn list_role_grants(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT m.rolname AS \"Role name\", r.rolname AS \"Member of\",\n  pg_catalog.concat_ws(', ',\n",
        );
        sql.push_str(if self.at_least(160000) {
            "    CASE WHEN pam.admin_option THEN 'ADMIN' END,\n\
             \x20   CASE WHEN pam.inherit_option THEN 'INHERIT' END,\n\
             \x20   CASE WHEN pam.set_option THEN 'SET' END\n"
        } else {
            "    CASE WHEN pam.admin_option THEN 'ADMIN' END,\n\
             \x20   CASE WHEN m.rolinherit THEN 'INHERIT' END,\n\
             \x20   'SET'\n"
        });
        sql.push_str(
            "  ) AS \"Options\",\n  g.rolname AS \"Grantor\"\n\
             FROM pg_catalog.pg_roles m\n\
             \x20    JOIN pg_catalog.pg_auth_members pam ON (pam.member = m.oid)\n\
             \x20    LEFT JOIN pg_catalog.pg_roles r ON (pam.roleid = r.oid)\n\
             \x20    LEFT JOIN pg_catalog.pg_roles g ON (pam.grantor = g.oid)\n",
        );
        let hide = self.hide_system(pattern);
        if hide {
            sql.push_str("WHERE m.rolname !~ '^pg_'\n");
        }
        self.pattern(&mut sql, pattern, hide, unqualified("m.rolname"), 1)?;
        sql.push_str("ORDER BY 1, 2, 4;\n");
        self.list(&sql, "List of role grants")
    }

    // \dt, \di, \dv, \dm, \ds, \dE and combinations
    fn list_relations(&mut self, kinds: &str, pattern: Option<&str>) -> Result<bool> {
        let explicit = ["t", "i", "v", "m", "s", "E"].iter().filter(|k| kinds.contains(*k)).count();
        let all = explicit == 0;
        let has = |kind: char| (all && kind != 'i') || kinds.contains(kind);
        let (tables, indexes, views, matviews, sequences, foreign) =
            (has('t'), has('i'), has('v'), has('m'), has('s'), has('E'));
        let show_am = self.verbose && !self.session.vars.settings().hide_tableam && (tables || matviews || indexes);

        let mut sql = String::from(
            "SELECT n.nspname as \"Schema\",\n\
             \x20 c.relname as \"Name\",\n\
             \x20 CASE c.relkind WHEN 'r' THEN 'table' WHEN 'v' THEN 'view' WHEN 'm' THEN 'materialized view' \
             WHEN 'i' THEN 'index' WHEN 'S' THEN 'sequence' WHEN 't' THEN 'TOAST table' WHEN 'f' THEN 'foreign table' \
             WHEN 'p' THEN 'partitioned table' WHEN 'I' THEN 'partitioned index' END as \"Type\",\n\
             \x20 pg_catalog.pg_get_userbyid(c.relowner) as \"Owner\"",
        );
        if indexes {
            sql.push_str(",\n  c2.relname as \"Table\"");
        }
        if self.verbose {
            sql.push_str(
                ",\n  CASE c.relpersistence WHEN 'p' THEN 'permanent' WHEN 't' THEN 'temporary' \
                 WHEN 'u' THEN 'unlogged' END as \"Persistence\"",
            );
            if show_am {
                sql.push_str(",\n  am.amname as \"Access method\"");
            }
            sql.push_str(
                ",\n  pg_catalog.pg_size_pretty(pg_catalog.pg_table_size(c.oid)) as \"Size\"\
                 ,\n  pg_catalog.obj_description(c.oid, 'pg_class') as \"Description\"",
            );
        }
        sql.push_str("\nFROM pg_catalog.pg_class c\n     LEFT JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace");
        if show_am {
            sql.push_str("\n     LEFT JOIN pg_catalog.pg_am am ON am.oid = c.relam");
        }
        if indexes {
            sql.push_str(
                "\n     LEFT JOIN pg_catalog.pg_index i ON i.indexrelid = c.oid\
                 \n     LEFT JOIN pg_catalog.pg_class c2 ON i.indrelid = c2.oid",
            );
        }

        let wide = self.system || pattern.is_some();
        let mut relkinds = Vec::new();
        if tables {
            relkinds.extend(["'r'", "'p'"]);
            if wide {
                relkinds.push("'t'");
            }
        }
        if views {
            relkinds.push("'v'");
        }
        if matviews {
            relkinds.push("'m'");
        }
        if indexes {
            relkinds.extend(["'i'", "'I'"]);
        }
        if sequences {
            relkinds.push("'S'");
        }
        if wide {
            relkinds.push("'s'");
        }
        if foreign {
            relkinds.push("'f'");
        }
        relkinds.push("''");
        sql.push_str(&format!("\nWHERE c.relkind IN ({})\n", relkinds.join(",")));
        if self.hide_system(pattern) {
            sql.push_str(
                "      AND n.nspname <> 'pg_catalog'\n\
                 \x20     AND n.nspname !~ '^pg_toast'\n\
                 \x20     AND n.nspname <> 'information_schema'\n",
            );
        }
        let cols = qualified("n.nspname", "c.relname", "pg_catalog.pg_table_is_visible(c.oid)");
        self.pattern(&mut sql, pattern, true, cols, 3)?;
        sql.push_str("ORDER BY 1,2;");

        let Some(result) = self.query(&sql)? else {
            return Ok(true);
        };
        let what = match () {
            _ if explicit != 1 => "relations",
            _ if tables => "tables",
            _ if indexes => "indexes",
            _ if views => "views",
            _ if matviews => "materialized views",
            _ if sequences => "sequences",
            _ => "foreign tables",
        };
        if result.ntuples() == 0 {
            let message = match pattern {
                Some(pattern) => format!("Did not find any {what} named \"{pattern}\"."),
                None => format!("Did not find any {what}."),
            };
            return self.not_found(message);
        }
        let title = format!("List of {what}");
        self.print(&result, &title, Vec::new())?;
        Ok(true)
    }

    // \dL
    fn list_languages(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT l.lanname AS \"Name\",\n\
             \x20      pg_catalog.pg_get_userbyid(l.lanowner) as \"Owner\",\n\
             \x20      l.lanpltrusted AS \"Trusted\"",
        );
        if self.verbose {
            sql.push_str(
                ",\n       NOT l.lanispl AS \"Internal language\",\n\
                 \x20      l.lanplcallfoid::pg_catalog.regprocedure AS \"Call handler\",\n\
                 \x20      l.lanvalidator::pg_catalog.regprocedure AS \"Validator\",\n\
                 \x20      l.laninline::pg_catalog.regprocedure AS \"Inline handler\",\n       ",
            );
            sql.push_str(&acl_column("l.lanacl"));
        }
        sql.push_str(
            ",\n       d.description AS \"Description\"\n\
             FROM pg_catalog.pg_language l\n\
             LEFT JOIN pg_catalog.pg_description d\n\
             \x20 ON d.classoid = l.tableoid AND d.objoid = l.oid\n\
             \x20 AND d.objsubid = 0\n",
        );
        if pattern.is_some() {
            self.pattern(&mut sql, pattern, false, unqualified("l.lanname"), 2)?;
        }
        if self.hide_system(pattern) {
            sql.push_str("WHERE l.lanplcallfoid != 0\n");
        }
        sql.push_str("ORDER BY 1;");
        self.list(&sql, "List of languages")
    }

    // \dD
    fn list_domains(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT n.nspname as \"Schema\",\n\
             \x20      t.typname as \"Name\",\n\
             \x20      pg_catalog.format_type(t.typbasetype, t.typtypmod) as \"Type\",\n\
             \x20      (SELECT c.collname FROM pg_catalog.pg_collation c, pg_catalog.pg_type bt\n\
             \x20       WHERE c.oid = t.typcollation AND bt.oid = t.typbasetype AND t.typcollation <> bt.typcollation) as \"Collation\",\n\
             \x20      CASE WHEN t.typnotnull THEN 'not null' END as \"Nullable\",\n\
             \x20      t.typdefault as \"Default\",\n\
             \x20      pg_catalog.array_to_string(ARRAY(\n\
             \x20        SELECT pg_catalog.pg_get_constraintdef(r.oid, true) FROM pg_catalog.pg_constraint r \
             WHERE t.oid = r.contypid AND r.contype = 'c' ORDER BY r.conname\n\
             \x20      ), ' ') as \"Check\"",
        );
        if self.verbose {
            sql.push_str(",\n  ");
            sql.push_str(&acl_column("t.typacl"));
            sql.push_str(",\n       d.description as \"Description\"");
        }
        sql.push_str("\nFROM pg_catalog.pg_type t\n     LEFT JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace\n");
        if self.verbose {
            sql.push_str(
                "     LEFT JOIN pg_catalog.pg_description d ON d.classoid = t.tableoid AND d.objoid = t.oid AND d.objsubid = 0\n",
            );
        }
        sql.push_str("WHERE t.typtype = 'd'\n");
        if self.hide_system(pattern) {
            sql.push_str(HIDE_SYSTEM);
        }
        let cols = qualified("n.nspname", "t.typname", "pg_catalog.pg_type_is_visible(t.oid)");
        self.pattern(&mut sql, pattern, true, cols, 3)?;
        sql.push_str("ORDER BY 1, 2;");
        self.list(&sql, "List of domains")
    }

    // \dc
    fn list_conversions(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT n.nspname AS \"Schema\",\n\
             \x20      c.conname AS \"Name\",\n\
             \x20      pg_catalog.pg_encoding_to_char(c.conforencoding) AS \"Source\",\n\
             \x20      pg_catalog.pg_encoding_to_char(c.contoencoding) AS \"Destination\",\n\
             \x20      CASE WHEN c.condefault THEN 'yes'\n\
             \x20      ELSE 'no' END AS \"Default?\"",
        );
        if self.verbose {
            sql.push_str(",\n       d.description AS \"Description\"");
        }
        sql.push_str("\nFROM pg_catalog.pg_conversion c\n     JOIN pg_catalog.pg_namespace n ON n.oid = c.connamespace\n");
        if self.verbose {
            sql.push_str(
                "LEFT JOIN pg_catalog.pg_description d ON d.classoid = c.tableoid\n\
                 \x20         AND d.objoid = c.oid AND d.objsubid = 0\n",
            );
        }
        sql.push_str("WHERE true\n");
        if self.hide_system(pattern) {
            sql.push_str("  AND n.nspname <> 'pg_catalog'\n  AND n.nspname <> 'information_schema'\n");
        }
        let cols = qualified("n.nspname", "c.conname", "pg_catalog.pg_conversion_is_visible(c.oid)");
        self.pattern(&mut sql, pattern, true, cols, 3)?;
        sql.push_str("ORDER BY 1, 2;");
        self.list(&sql, "List of conversions")
    }

    // \dconfig
    fn list_config(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql =
            String::from("SELECT s.name AS \"Parameter\", pg_catalog.current_setting(s.name) AS \"Value\"");
        if self.verbose {
            sql.push_str(", s.vartype AS \"Type\", s.context AS \"Context\", ");
            if self.at_least(150000) {
                sql.push_str(&acl_column("p.paracl"));
            } else {
                sql.push_str("NULL AS \"Access privileges\"");
            }
        }
        sql.push_str("\nFROM pg_catalog.pg_settings s\n");
        if self.verbose && self.at_least(150000) {
            sql.push_str("  LEFT JOIN pg_catalog.pg_parameter_acl p\n  ON pg_catalog.lower(s.name) = p.parname\n");
        }
        match pattern {
            Some(_) => {
                self.pattern(&mut sql, pattern, false, unqualified("pg_catalog.lower(s.name)"), 1)?;
            }
            None => sql.push_str("WHERE s.source <> 'default' AND\n      s.setting IS DISTINCT FROM s.boot_val\n"),
        }
        sql.push_str("ORDER BY 1;");
        let title = match pattern {
            Some(_) => "List of configuration parameters",
            None => "List of non-default configuration parameters",
        };
        self.list(&sql, title)
    }

    // \dy
    fn list_event_triggers(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT evtname as \"Name\", evtevent as \"Event\", pg_catalog.pg_get_userbyid(e.evtowner) as \"Owner\",\n\
             \x20case evtenabled when 'O' then 'enabled'  when 'R' then 'replica'  when 'A' then 'always'  \
             when 'D' then 'disabled' end as \"Enabled\",\n\
             \x20e.evtfoid::pg_catalog.regproc as \"Function\", \
             pg_catalog.array_to_string(array(select x from pg_catalog.unnest(evttags) as t(x)), ', ') as \"Tags\"",
        );
        if self.verbose {
            sql.push_str(",\npg_catalog.obj_description(e.oid, 'pg_event_trigger') as \"Description\"");
        }
        sql.push_str("\nFROM pg_catalog.pg_event_trigger e ");
        self.pattern(&mut sql, pattern, false, unqualified("evtname"), 1)?;
        sql.push_str("ORDER BY 1");
        self.list(&sql, "List of event triggers")
    }

    // \dX
    fn list_extended_stats(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT \n\
             es.stxnamespace::pg_catalog.regnamespace::pg_catalog.text AS \"Schema\", \n\
             es.stxname AS \"Name\", \n",
        );
        sql.push_str(if self.at_least(140000) {
            "pg_catalog.format('%s FROM %s', \n\
             \x20 pg_catalog.pg_get_statisticsobjdef_columns(es.oid), \n\
             \x20 es.stxrelid::pg_catalog.regclass) AS \"Definition\""
        } else {
            "pg_catalog.format('%s FROM %s', \n\
             \x20 (SELECT pg_catalog.string_agg(pg_catalog.quote_ident(a.attname),', ') \n\
             \x20  FROM pg_catalog.unnest(es.stxkeys) s(attnum) \n\
             \x20  JOIN pg_catalog.pg_attribute a \n\
             \x20  ON (es.stxrelid = a.attrelid \n\
             \x20  AND a.attnum = s.attnum \n\
             \x20  AND NOT a.attisdropped)), \n\
             es.stxrelid::pg_catalog.regclass) AS \"Definition\""
        });
        sql.push_str(
            ",\nCASE WHEN 'd' = any(es.stxkind) THEN 'defined' \nEND AS \"Ndistinct\", \n\
             CASE WHEN 'f' = any(es.stxkind) THEN 'defined' \nEND AS \"Dependencies\",\n\
             CASE WHEN 'm' = any(es.stxkind) THEN 'defined' \nEND AS \"MCV\"  \n\
             FROM pg_catalog.pg_statistic_ext es \n",
        );
        let cols = qualified(
            "es.stxnamespace::pg_catalog.regnamespace::pg_catalog.text",
            "es.stxname",
            "pg_catalog.pg_statistics_obj_is_visible(es.oid)",
        );
        self.pattern(&mut sql, pattern, false, cols, 3)?;
        sql.push_str("ORDER BY 1, 2;");
        self.list(&sql, "List of extended statistics")
    }

    // \dC
    fn list_casts(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT pg_catalog.format_type(castsource, NULL) AS \"Source type\",\n\
             \x20      pg_catalog.format_type(casttarget, NULL) AS \"Target type\",\n\
             \x20      CASE WHEN c.castmethod = 'b' THEN '(binary coercible)'\n\
             \x20           WHEN c.castmethod = 'i' THEN '(with inout)'\n\
             \x20           ELSE p.proname\n\
             \x20      END AS \"Function\",\n\
             \x20      CASE WHEN c.castcontext = 'e' THEN 'no'\n\
             \x20           WHEN c.castcontext = 'a' THEN 'in assignment'\n\
             \x20           ELSE 'yes'\n\
             \x20      END AS \"Implicit?\"",
        );
        if self.verbose {
            sql.push_str(
                ",\n       CASE WHEN p.proleakproof THEN 'yes'\n\
                 \x20           ELSE 'no'\n\
                 \x20      END AS \"Leakproof?\",\n\
                 \x20      d.description AS \"Description\"",
            );
        }
        sql.push_str(
            "\nFROM pg_catalog.pg_cast c LEFT JOIN pg_catalog.pg_proc p\n\
             \x20    ON c.castfunc = p.oid\n\
             \x20    LEFT JOIN pg_catalog.pg_type ts\n\
             \x20    ON c.castsource = ts.oid\n\
             \x20    LEFT JOIN pg_catalog.pg_namespace ns\n\
             \x20    ON ns.oid = ts.typnamespace\n\
             \x20    LEFT JOIN pg_catalog.pg_type tt\n\
             \x20    ON c.casttarget = tt.oid\n\
             \x20    LEFT JOIN pg_catalog.pg_namespace nt\n\
             \x20    ON nt.oid = tt.typnamespace\n",
        );
        if self.verbose {
            sql.push_str(
                "     LEFT JOIN pg_catalog.pg_description d\n\
                 \x20    ON d.classoid = c.tableoid AND d.objoid = c.oid AND d.objsubid = 0\n",
            );
        }
        sql.push_str("WHERE ( (true");
        let source = NameColumns {
            schema: Some("ns.nspname"),
            name: Some("ts.typname"),
            alt_name: Some("pg_catalog.format_type(ts.oid, NULL)"),
            visibility: Some("pg_catalog.pg_type_is_visible(ts.oid)"),
        };
        self.pattern(&mut sql, pattern, true, source, 3)?;
        sql.push_str(") OR (true");
        let target = NameColumns {
            schema: Some("nt.nspname"),
            name: Some("tt.typname"),
            alt_name: Some("pg_catalog.format_type(tt.oid, NULL)"),
            visibility: Some("pg_catalog.pg_type_is_visible(tt.oid)"),
        };
        self.pattern(&mut sql, pattern, true, target, 3)?;
        sql.push_str(") )\nORDER BY 1, 2;");
        self.list(&sql, "List of casts")
    }

    // \dO
    fn list_collations(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT\n\
             \x20 n.nspname AS \"Schema\",\n\
             \x20 c.collname AS \"Name\",\n\
             \x20 CASE c.collprovider WHEN 'd' THEN 'default' WHEN 'b' THEN 'builtin' WHEN 'c' THEN 'libc' \
             WHEN 'i' THEN 'icu' END AS \"Provider\",\n\
             \x20 c.collcollate AS \"Collate\",\n\
             \x20 c.collctype AS \"Ctype\",\n",
        );
        sql.push_str(if self.at_least(170000) {
            "  c.colllocale AS \"Locale\",\n"
        } else if self.at_least(150000) {
            "  c.colliculocale AS \"Locale\",\n"
        } else {
            "  c.collcollate AS \"Locale\",\n"
        });
        sql.push_str(if self.at_least(160000) {
            "  c.collicurules AS \"ICU Rules\",\n"
        } else {
            "  NULL AS \"ICU Rules\",\n"
        });
        sql.push_str("  CASE WHEN c.collisdeterministic THEN 'yes' ELSE 'no' END AS \"Deterministic?\"");
        if self.verbose {
            sql.push_str(",\n  pg_catalog.obj_description(c.oid, 'pg_collation') AS \"Description\"");
        }
        sql.push_str("\nFROM pg_catalog.pg_collation c, pg_catalog.pg_namespace n\nWHERE n.oid = c.collnamespace\n");
        if self.hide_system(pattern) {
            sql.push_str(HIDE_SYSTEM);
        }
        sql.push_str(
            "      AND c.collencoding IN (-1, pg_catalog.pg_char_to_encoding(pg_catalog.getdatabaseencoding()))\n",
        );
        let cols = qualified("n.nspname", "c.collname", "pg_catalog.pg_collation_is_visible(c.oid)");
        self.pattern(&mut sql, pattern, true, cols, 3)?;
        sql.push_str("ORDER BY 1, 2;");
        self.list(&sql, "List of collations")
    }

    // \dn
    fn list_schemas(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT n.nspname AS \"Name\",\n  pg_catalog.pg_get_userbyid(n.nspowner) AS \"Owner\"",
        );
        if self.verbose {
            sql.push_str(",\n  ");
            sql.push_str(&acl_column("n.nspacl"));
            sql.push_str(",\n  pg_catalog.obj_description(n.oid, 'pg_namespace') AS \"Description\"");
        }
        sql.push_str("\nFROM pg_catalog.pg_namespace n\n");
        let hide = self.hide_system(pattern);
        if hide {
            sql.push_str("WHERE n.nspname !~ '^pg_' AND n.nspname <> 'information_schema'\n");
        }
        self.pattern(&mut sql, pattern, hide, unqualified("n.nspname"), 2)?;
        sql.push_str("ORDER BY 1;");
        let Some(result) = self.query(&sql)? else {
            return Ok(true);
        };

        let mut footers = Vec::new();
        if let Some(pattern) = pattern.filter(|_| self.at_least(150000)) {
            let sql = format!(
                "SELECT pubname \n\
                 FROM pg_catalog.pg_publication p\n\
                 \x20    JOIN pg_catalog.pg_publication_namespace pn ON p.oid = pn.pnpubid\n\
                 \x20    JOIN pg_catalog.pg_namespace n ON n.oid = pn.pnnspid \n\
                 WHERE n.nspname = {}\n\
                 ORDER BY 1",
                quote_literal(pattern)
            );
            if let Some(publications) = self.query(&sql)? {
                if publications.ntuples() > 0 {
                    footers.push("Publications:".to_owned());
                    for row in 0..publications.ntuples() {
                        footers.push(format!("    \"{}\"", publications.get(row, 0)));
                    }
                }
            }
        }
        self.print(&result, "List of schemas", footers)?;
        Ok(true)
    }

    fn list_text_search(
        &mut self,
        select: &str,
        pattern: Option<&str>,
        cols: NameColumns<'_>,
        title: &str,
    ) -> Result<bool> {
        let mut sql = select.to_owned();
        self.pattern(&mut sql, pattern, false, cols, 3)?;
        sql.push_str("ORDER BY 1, 2;");
        self.list(&sql, title)
    }

    // \dFp
    fn list_ts_parsers(&mut self, pattern: Option<&str>) -> Result<bool> {
        let sql = "SELECT\n\
                   \x20 n.nspname as \"Schema\",\n\
                   \x20 p.prsname as \"Name\",\n\
                   \x20 pg_catalog.obj_description(p.oid, 'pg_ts_parser') as \"Description\"\n\
                   FROM pg_catalog.pg_ts_parser p\n\
                   LEFT JOIN pg_catalog.pg_namespace n ON n.oid = p.prsnamespace\n";
        let cols = qualified("n.nspname", "p.prsname", "pg_catalog.pg_ts_parser_is_visible(p.oid)");
        self.list_text_search(sql, pattern, cols, "List of text search parsers")
    }

    // \dFd
    fn list_ts_dictionaries(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from("SELECT\n  n.nspname as \"Schema\",\n  d.dictname as \"Name\",\n");
        if self.verbose {
            sql.push_str(
                "  ( SELECT COALESCE(nt.nspname, '(null)')::pg_catalog.text || '.' || t.tmplname FROM\n\
                 \x20   pg_catalog.pg_ts_template t\n\
                 \x20   LEFT JOIN pg_catalog.pg_namespace nt ON nt.oid = t.tmplnamespace\n\
                 \x20   WHERE d.dicttemplate = t.oid ) AS  \"Template\",\n\
                 \x20 d.dictinitoption as \"Init options\",\n",
            );
        }
        sql.push_str(
            "  pg_catalog.obj_description(d.oid, 'pg_ts_dict') as \"Description\"\n\
             FROM pg_catalog.pg_ts_dict d\n\
             LEFT JOIN pg_catalog.pg_namespace n ON n.oid = d.dictnamespace\n",
        );
        let cols = qualified("n.nspname", "d.dictname", "pg_catalog.pg_ts_dict_is_visible(d.oid)");
        self.list_text_search(&sql, pattern, cols, "List of text search dictionaries")
    }

    // \dFt
    fn list_ts_templates(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from("SELECT\n  n.nspname AS \"Schema\",\n  t.tmplname AS \"Name\",\n");
        if self.verbose {
            sql.push_str(
                "  t.tmplinit::pg_catalog.regproc AS \"Init\",\n  t.tmpllexize::pg_catalog.regproc AS \"Lexize\",\n",
            );
        }
        sql.push_str(
            "  pg_catalog.obj_description(t.oid, 'pg_ts_template') AS \"Description\"\n\
             FROM pg_catalog.pg_ts_template t\n\
             LEFT JOIN pg_catalog.pg_namespace n ON n.oid = t.tmplnamespace\n",
        );
        let cols = qualified("n.nspname", "t.tmplname", "pg_catalog.pg_ts_template_is_visible(t.oid)");
        self.list_text_search(&sql, pattern, cols, "List of text search templates")
    }

    // \dF
    fn list_ts_configs(&mut self, pattern: Option<&str>) -> Result<bool> {
        let sql = "SELECT\n\
                   \x20  n.nspname as \"Schema\",\n\
                   \x20  c.cfgname as \"Name\",\n\
                   \x20  pg_catalog.obj_description(c.oid, 'pg_ts_config') as \"Description\"\n\
                   FROM pg_catalog.pg_ts_config c\n\
                   LEFT JOIN pg_catalog.pg_namespace n ON n.oid = c.cfgnamespace\n";
        let cols = qualified("n.nspname", "c.cfgname", "pg_catalog.pg_ts_config_is_visible(c.oid)");
        self.list_text_search(sql, pattern, cols, "List of text search configurations")
    }

    // \dew
    fn list_fdws(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT fdw.fdwname AS \"Name\",\n\
             \x20 pg_catalog.pg_get_userbyid(fdw.fdwowner) AS \"Owner\",\n\
             \x20 fdw.fdwhandler::pg_catalog.regproc AS \"Handler\",\n\
             \x20 fdw.fdwvalidator::pg_catalog.regproc AS \"Validator\"",
        );
        if self.verbose {
            sql.push_str(",\n  ");
            sql.push_str(&acl_column("fdwacl"));
            sql.push_str(",\n ");
            sql.push_str(&options_column("fdwoptions", "FDW options"));
            sql.push_str(",\n  d.description AS \"Description\" ");
        }
        sql.push_str("\nFROM pg_catalog.pg_foreign_data_wrapper fdw\n");
        if self.verbose {
            sql.push_str(
                "LEFT JOIN pg_catalog.pg_description d\n       ON d.classoid = fdw.tableoid \
                 AND d.objoid = fdw.oid AND d.objsubid = 0\n",
            );
        }
        self.pattern(&mut sql, pattern, false, unqualified("fdwname"), 1)?;
        sql.push_str("ORDER BY 1;");
        self.list(&sql, "List of foreign-data wrappers")
    }

    // \des
    fn list_foreign_servers(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT s.srvname AS \"Name\",\n\
             \x20 pg_catalog.pg_get_userbyid(s.srvowner) AS \"Owner\",\n\
             \x20 f.fdwname AS \"Foreign-data wrapper\"",
        );
        if self.verbose {
            sql.push_str(",\n  ");
            sql.push_str(&acl_column("s.srvacl"));
            sql.push_str(",\n  s.srvtype AS \"Type\",\n  s.srvversion AS \"Version\",\n  ");
            sql.push_str(&options_column("srvoptions", "FDW options"));
            sql.push_str(",\n  d.description AS \"Description\"");
        }
        sql.push_str(
            "\nFROM pg_catalog.pg_foreign_server s\n     JOIN pg_catalog.pg_foreign_data_wrapper f ON f.oid=s.srvfdw\n",
        );
        if self.verbose {
            sql.push_str(
                "LEFT JOIN pg_catalog.pg_description d\n       ON d.classoid = s.tableoid AND d.objoid = s.oid \
                 AND d.objsubid = 0\n",
            );
        }
        self.pattern(&mut sql, pattern, false, unqualified("s.srvname"), 1)?;
        sql.push_str("ORDER BY 1;");
        self.list(&sql, "List of foreign servers")
    }

    // \deu
    fn list_user_mappings(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from("SELECT um.srvname AS \"Server\",\n  um.usename AS \"User name\"");
        if self.verbose {
            sql.push_str(",\n ");
            sql.push_str(&options_column("umoptions", "FDW options"));
        }
        sql.push_str("\nFROM pg_catalog.pg_user_mappings um\n");
        let cols = NameColumns { name: Some("um.srvname"), alt_name: Some("um.usename"), ..Default::default() };
        self.pattern(&mut sql, pattern, false, cols, 1)?;
        sql.push_str("ORDER BY 1, 2;");
        self.list(&sql, "List of user mappings")
    }

    // \det
    fn list_foreign_tables(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT n.nspname AS \"Schema\",\n  c.relname AS \"Table\",\n  s.srvname AS \"Server\"",
        );
        if self.verbose {
            sql.push_str(",\n ");
            sql.push_str(&options_column("ftoptions", "FDW options"));
            sql.push_str(",\n  d.description AS \"Description\"");
        }
        sql.push_str(
            "\nFROM pg_catalog.pg_foreign_table ft\n\
             \x20 INNER JOIN pg_catalog.pg_class c ON c.oid = ft.ftrelid\n\
             \x20 INNER JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace\n\
             \x20 INNER JOIN pg_catalog.pg_foreign_server s ON s.oid = ft.ftserver\n",
        );
        if self.verbose {
            sql.push_str(
                "   LEFT JOIN pg_catalog.pg_description d\n          ON d.classoid = c.tableoid AND \
                 d.objoid = c.oid AND d.objsubid = 0\n",
            );
        }
        let cols = qualified("n.nspname", "c.relname", "pg_catalog.pg_table_is_visible(c.oid)");
        self.pattern(&mut sql, pattern, false, cols, 3)?;
        sql.push_str("ORDER BY 1, 2;");
        self.list(&sql, "List of foreign tables")
    }

    // \dx
    fn list_extensions(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT e.extname AS \"Name\", e.extversion AS \"Version\", ae.default_version AS \"Default version\",\
             n.nspname AS \"Schema\", d.description AS \"Description\"\n\
             FROM pg_catalog.pg_extension e \
             LEFT JOIN pg_catalog.pg_namespace n ON n.oid = e.extnamespace \
             LEFT JOIN pg_catalog.pg_description d ON d.objoid = e.oid \
             AND d.classoid = 'pg_catalog.pg_extension'::pg_catalog.regclass \
             LEFT JOIN pg_catalog.pg_available_extensions() ae(name, default_version, comment) ON ae.name = e.extname\n",
        );
        self.pattern(&mut sql, pattern, false, unqualified("e.extname"), 1)?;
        sql.push_str("ORDER BY 1;");
        self.list(&sql, "List of installed extensions")
    }

    // \dx+
    fn list_extension_contents(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from("SELECT e.extname, e.oid\nFROM pg_catalog.pg_extension e\n");
        self.pattern(&mut sql, pattern, false, unqualified("e.extname"), 1)?;
        sql.push_str("ORDER BY 1;");
        let Some(result) = self.query(&sql)? else {
            return Ok(true);
        };
        if result.ntuples() == 0 {
            return self.not_found(match pattern {
                Some(pattern) => format!("Did not find any extension named \"{pattern}\"."),
                None => "Did not find any extensions.".into(),
            });
        }
        for row in 0..result.ntuples() {
            let (name, oid) = (result.get(row, 0), result.get(row, 1));
            let sql = format!(
                "SELECT pg_catalog.pg_describe_object(classid, objid, 0) AS \"Object description\"\n\
                 FROM pg_catalog.pg_depend\n\
                 WHERE refclassid = 'pg_catalog.pg_extension'::pg_catalog.regclass AND refobjid = '{oid}' AND deptype = 'e'\n\
                 ORDER BY 1;"
            );
            let title = format!("Objects in extension \"{name}\"");
            self.list(&sql, &title)?;
            if self.session.rt.interrupted() {
                break;
            }
        }
        Ok(true)
    }

    // \dRp
    fn list_publications(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT pubname AS \"Name\",\n\
             \x20 pg_catalog.pg_get_userbyid(pubowner) AS \"Owner\",\n\
             \x20 puballtables AS \"All tables\",\n\
             \x20 pubinsert AS \"Inserts\",\n\
             \x20 pubupdate AS \"Updates\",\n\
             \x20 pubdelete AS \"Deletes\",\n\
             \x20 pubtruncate AS \"Truncates\"",
        );
        if self.at_least(180000) {
            sql.push_str(
                ",\n (CASE pubgencols\n    WHEN 'n' THEN 'none'\n    WHEN 's' THEN 'stored'\n   END) AS \"Generated columns\"",
            );
        }
        sql.push_str(",\n  pubviaroot AS \"Via root\"\nFROM pg_catalog.pg_publication\n");
        self.pattern(&mut sql, pattern, false, unqualified("pubname"), 1)?;
        sql.push_str("ORDER BY 1;");
        self.list(&sql, "List of publications")
    }

    // \dRs
    fn list_subscriptions(&mut self, pattern: Option<&str>) -> Result<bool> {
        let mut sql = String::from(
            "SELECT subname AS \"Name\"\n\
             ,  pg_catalog.pg_get_userbyid(subowner) AS \"Owner\"\n\
             ,  subenabled AS \"Enabled\"\n\
             ,  subpublications AS \"Publication\"\n",
        );
        if self.verbose {
            sql.push_str(", subbinary AS \"Binary\"\n");
            sql.push_str(if self.at_least(160000) {
                ", (CASE substream\n    WHEN 'f' THEN 'off'\n    WHEN 't' THEN 'on'\n    WHEN 'p' THEN 'parallel'\n   END) AS \"Streaming\"\n"
            } else {
                ", substream AS \"Streaming\"\n"
            });
            if self.at_least(150000) {
                sql.push_str(", subtwophasestate AS \"Two-phase commit\"\n, subdisableonerr AS \"Disable on error\"\n");
            }
            if self.at_least(160000) {
                sql.push_str(
                    ", suborigin AS \"Origin\"\n, subpasswordrequired AS \"Password required\"\n\
                     , subrunasowner AS \"Run as owner?\"\n",
                );
            }
            if self.at_least(170000) {
                sql.push_str(", subfailover AS \"Failover\"\n");
            }
            sql.push_str(",  subsynccommit AS \"Synchronous commit\"\n,  subconninfo AS \"Conninfo\"\n");
            if self.at_least(150000) {
                sql.push_str(", subskiplsn AS \"Skip LSN\"\n");
            }
        }
        sql.push_str(
            "FROM pg_catalog.pg_subscription\n\
             WHERE subdbid = (SELECT oid\n\
             \x20                FROM pg_catalog.pg_database\n\
             \x20                WHERE datname = pg_catalog.current_database())",
        );
        self.pattern(&mut sql, pattern, true, unqualified("subname"), 1)?;
        sql.push_str("ORDER BY 1;");
        self.list(&sql, "List of subscriptions")
    }

    // \lo_list and \dl
    fn list_large_objects(&mut self) -> Result<bool> {
        let mut sql = String::from(
            "SELECT oid as \"ID\",\n  pg_catalog.pg_get_userbyid(lomowner) as \"Owner\",\n  ",
        );
        if self.verbose {
            sql.push_str(&acl_column("lomacl"));
            sql.push_str(",\n  ");
        }
        sql.push_str(
            "pg_catalog.obj_description(oid, 'pg_largeobject') as \"Description\"\n\
             FROM pg_catalog.pg_largeobject_metadata\n\
             ORDER BY oid",
        );
        self.list(&sql, "Large objects")
    }

    // \d pattern
    fn describe_tables(&mut self, pattern: &str) -> Result<bool> {
        let mut sql = String::from(
            "SELECT c.oid,\n  n.nspname,\n  c.relname\n\
             FROM pg_catalog.pg_class c\n\
             \x20    LEFT JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace\n",
        );
        let cols = qualified("n.nspname", "c.relname", "pg_catalog.pg_table_is_visible(c.oid)");
        self.pattern(&mut sql, Some(pattern), false, cols, 3)?;
        sql.push_str("ORDER BY 2, 3;");
        let Some(result) = self.query(&sql)? else {
            return Ok(true);
        };
        if result.ntuples() == 0 {
            if !self.session.quiet() {
                self.session.error(format!("Did not find any relation named \"{pattern}\"."));
            }
            return Ok(false);
        }
        for row in 0..result.ntuples() {
            let (oid, schema, name) = (result.get(row, 0), result.get(row, 1), result.get(row, 2));
            if !self.describe_one(oid, schema, name)? {
                return Ok(false);
            }
            if self.session.rt.interrupted() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn describe_one(&mut self, oid: &str, schema: &str, name: &str) -> Result<bool> {
        let options = match self.verbose {
            true => {
                "pg_catalog.array_to_string(c.reloptions || \
                 array(select 'toast.' || x from pg_catalog.unnest(tc.reloptions) x), ', ')"
            }
            false => "''",
        };
        let sql = format!(
            "SELECT c.relchecks, c.relkind, c.relhasindex, c.relhasrules, \
             c.relhastriggers, c.relrowsecurity, c.relforcerowsecurity, \
             c.relispartition, {options}, \
             (SELECT spcname FROM pg_catalog.pg_tablespace WHERE oid = c.reltablespace), \
             CASE WHEN c.reloftype = 0 THEN '' ELSE c.reloftype::pg_catalog.regtype::pg_catalog.text END, \
             c.relpersistence, c.relreplident, am.amname\n\
             FROM pg_catalog.pg_class c\n \
             LEFT JOIN pg_catalog.pg_class tc ON (c.reltoastrelid = tc.oid)\n\
             LEFT JOIN pg_catalog.pg_am am ON (c.relam = am.oid)\n\
             WHERE c.oid = '{oid}';"
        );
        let Some(result) = self.query(&sql)? else {
            return Ok(true);
        };
        if result.ntuples() == 0 {
            if !self.session.quiet() {
                self.session.error(format!("Did not find any relation with OID {oid}."));
            }
            return Ok(false);
        }
        let flag = |col: usize| result.get(0, col) == "t";
        let info = TableInfo {
            checks: result.get(0, 0).parse().unwrap_or(0),
            relkind: result.get(0, 1).chars().next().unwrap_or(' '),
            has_index: flag(2),
            has_triggers: flag(4),
            row_security: flag(5),
            force_row_security: flag(6),
            is_partition: flag(7),
            reloptions: result.get(0, 8).to_owned(),
            tablespace: result.get(0, 9).to_owned(),
            of_type: result.get(0, 10).to_owned(),
            persistence: result.get(0, 11).chars().next().unwrap_or('p'),
            replident: result.get(0, 12).chars().next().unwrap_or('d'),
            am: result.get(0, 13).to_owned(),
        };

        if info.relkind == 'S' {
            return self.describe_sequence(oid, schema, name, &info);
        }

        let mut table = self.column_table(oid, schema, name, &info)?;
        self.table_footers(&mut table, oid, schema, &info)?;

        let mut opt = self.session.popt.clone();
        opt.default_footer = false;
        opt.expanded = Expanded::Off;
        self.render(&table, &opt)?;
        Ok(true)
    }

    fn describe_sequence(&mut self, oid: &str, schema: &str, name: &str, info: &TableInfo) -> Result<bool> {
        let sql = format!(
            "SELECT pg_catalog.format_type(seqtypid, NULL) AS \"Type\",\n\
             \x20      seqstart AS \"Start\",\n\
             \x20      seqmin AS \"Minimum\",\n\
             \x20      seqmax AS \"Maximum\",\n\
             \x20      seqincrement AS \"Increment\",\n\
             \x20      CASE WHEN seqcycle THEN 'yes' ELSE 'no' END AS \"Cycles?\",\n\
             \x20      seqcache AS \"Cache\"\n\
             FROM pg_catalog.pg_sequence\n\
             WHERE seqrelid = '{oid}';"
        );
        let Some(result) = self.query(&sql)? else {
            return Ok(true);
        };
        let owner_sql = format!(
            "SELECT pg_catalog.quote_ident(nspname) || '.' ||\n   pg_catalog.quote_ident(relname) || '.' ||\n   \
             pg_catalog.quote_ident(attname),\n   d.deptype\n\
             FROM pg_catalog.pg_class c\n\
             INNER JOIN pg_catalog.pg_depend d ON c.oid=d.refobjid\n\
             INNER JOIN pg_catalog.pg_namespace n ON n.oid=c.relnamespace\n\
             INNER JOIN pg_catalog.pg_attribute a ON (\n a.attrelid=c.oid AND\n a.attnum=d.refobjsubid)\n\
             WHERE d.classid='pg_catalog.pg_class'::pg_catalog.regclass\n \
             AND d.refclassid='pg_catalog.pg_class'::pg_catalog.regclass\n \
             AND d.objid='{oid}'\n AND d.deptype IN ('a', 'i')"
        );
        let mut footers = Vec::new();
        if let Some(owner) = self.query(&owner_sql)? {
            if owner.ntuples() == 1 {
                match owner.get(0, 1) {
                    "a" => footers.push(format!("Owned by: {}", owner.get(0, 0))),
                    "i" => footers.push(format!("Sequence for identity column: {}", owner.get(0, 0))),
                    _ => {}
                }
            }
        }
        let title = match info.persistence {
            'u' => format!("Unlogged sequence \"{schema}.{name}\""),
            _ => format!("Sequence \"{schema}.{name}\""),
        };
        let mut opt = self.session.popt.clone();
        opt.default_footer = false;
        let mut table = result.to_table(&opt, Some(title));
        for footer in footers {
            table.add_footer(footer);
        }
        self.render(&table, &opt)?;
        Ok(true)
    }

    /// Column rows of `\d`, with the title for the relation kind.
    fn column_table(&mut self, oid: &str, schema: &str, name: &str, info: &TableInfo) -> Result<Table> {
        let kind = info.relkind;
        let details = matches!(kind, 'r' | 'v' | 'm' | 'f' | 'c' | 'p');
        let is_index = matches!(kind, 'i' | 'I');
        let mut columns = vec!["a.attname".to_owned(), "pg_catalog.format_type(a.atttypid, a.atttypmod)".into()];
        let mut headers = vec!["Column", "Type"];
        if details {
            columns.extend([
                "(SELECT pg_catalog.pg_get_expr(d.adbin, d.adrelid, true)\n   FROM pg_catalog.pg_attrdef d\n   \
                 WHERE d.adrelid = a.attrelid AND d.adnum = a.attnum AND a.atthasdef)"
                    .to_owned(),
                "a.attnotnull".into(),
                "(SELECT c.collname FROM pg_catalog.pg_collation c, pg_catalog.pg_type t\n   \
                 WHERE c.oid = a.attcollation AND t.oid = a.atttypid AND a.attcollation <> t.typcollation) AS attcollation"
                    .into(),
                "a.attidentity".into(),
                "a.attgenerated".into(),
            ]);
            headers.extend(["Collation", "Nullable", "Default"]);
        }
        if is_index {
            columns.push(format!(
                "CASE WHEN a.attnum <= (SELECT i.indnkeyatts FROM pg_catalog.pg_index i WHERE i.indexrelid = '{oid}') \
                 THEN 'yes' ELSE 'no' END AS is_key"
            ));
            columns.push("pg_catalog.pg_get_indexdef(a.attrelid, a.attnum, TRUE) AS indexdef".into());
            headers.extend(["Key?", "Definition"]);
        }
        if kind == 'f' {
            columns.push(options_column("attfdwoptions", "attfdwoptions"));
            headers.push("FDW options");
        }
        let hide_compression = self.session.vars.settings().hide_compression;
        let (storage, compression, stats, description) = match self.verbose {
            true => (
                true,
                !hide_compression && matches!(kind, 'r' | 'p' | 'm'),
                matches!(kind, 'r' | 'i' | 'I' | 'm' | 'f' | 'p'),
                details,
            ),
            false => (false, false, false, false),
        };
        if storage {
            columns.push("a.attstorage".into());
            headers.push("Storage");
        }
        if compression {
            columns.push("a.attcompression AS attcompression".into());
            headers.push("Compression");
        }
        if stats {
            columns.push("CASE WHEN a.attstattarget=-1 THEN NULL ELSE a.attstattarget END AS attstattarget".into());
            headers.push("Stats target");
        }
        if description {
            columns.push("pg_catalog.col_description(a.attrelid, a.attnum)".into());
            headers.push("Description");
        }
        let sql = format!(
            "SELECT {}\nFROM pg_catalog.pg_attribute a\n\
             WHERE a.attrelid = '{oid}' AND a.attnum > 0 AND NOT a.attisdropped\nORDER BY a.attnum;",
            columns.join(",\n  ")
        );
        let result = self.query(&sql)?.unwrap_or_else(|| PgResult::from_text(&[], Vec::new()));

        let unlogged = info.persistence == 'u';
        let title = match (kind, unlogged) {
            ('r', true) => format!("Unlogged table \"{schema}.{name}\""),
            ('r', false) => format!("Table \"{schema}.{name}\""),
            ('v', _) => format!("View \"{schema}.{name}\""),
            ('m', _) => format!("Materialized view \"{schema}.{name}\""),
            ('i', true) => format!("Unlogged index \"{schema}.{name}\""),
            ('i', false) => format!("Index \"{schema}.{name}\""),
            ('I', true) => format!("Unlogged partitioned index \"{schema}.{name}\""),
            ('I', false) => format!("Partitioned index \"{schema}.{name}\""),
            ('t', _) => format!("TOAST table \"{schema}.{name}\""),
            ('c', _) => format!("Composite type \"{schema}.{name}\""),
            ('f', _) => format!("Foreign table \"{schema}.{name}\""),
            ('p', true) => format!("Unlogged partitioned table \"{schema}.{name}\""),
            ('p', false) => format!("Partitioned table \"{schema}.{name}\""),
            (other, _) => format!("?{other}? \"{schema}.{name}\""),
        };

        let mut table = Table::new(Some(title));
        for header in &headers {
            table.add_header(*header, Align::Left);
        }
        for row in 0..result.ntuples() {
            let cell = |col: usize| result.get(row, col).to_owned();
            let mut cells = vec![cell(0), cell(1)];
            let mut col = 2;
            if details {
                let default = cell(col);
                let not_null = result.get(row, col + 1) == "t";
                let collation = cell(col + 2);
                let default = match (result.get(row, col + 3), result.get(row, col + 4)) {
                    ("a", _) => "generated always as identity".to_owned(),
                    ("d", _) => "generated by default as identity".to_owned(),
                    (_, "s") => format!("generated always as ({default}) stored"),
                    (_, "v") => format!("generated always as ({default})"),
                    _ => default,
                };
                cells.push(collation);
                cells.push(if not_null { "not null".into() } else { String::new() });
                cells.push(default);
                col += 5;
            }
            if is_index {
                cells.push(cell(col));
                cells.push(cell(col + 1));
                col += 2;
            }
            if kind == 'f' {
                cells.push(cell(col));
                col += 1;
            }
            if storage {
                let name = match result.get(row, col) {
                    "p" => "plain",
                    "m" => "main",
                    "x" => "extended",
                    "e" => "external",
                    _ => "???",
                };
                cells.push(name.to_owned());
                col += 1;
            }
            if compression {
                let name = match result.get(row, col) {
                    "p" => "pglz",
                    "l" => "lz4",
                    "" => "",
                    _ => "???",
                };
                cells.push(name.to_owned());
                col += 1;
            }
            if stats {
                cells.push(cell(col));
                col += 1;
            }
            if description {
                cells.push(cell(col));
            }
            table.add_row(cells);
        }
        Ok(table)
    }

    fn table_footers(&mut self, table: &mut Table, oid: &str, schema: &str, info: &TableInfo) -> Result<()> {
        let kind = info.relkind;

        if info.is_partition {
            let mut sql = String::from(
                "SELECT inhparent::pg_catalog.regclass,\n  pg_catalog.pg_get_expr(c.relpartbound, c.oid),\n  inhdetachpending",
            );
            if self.verbose {
                sql.push_str(",\n  pg_catalog.pg_get_partition_constraintdef(c.oid)");
            }
            sql.push_str(&format!(
                "\nFROM pg_catalog.pg_class c JOIN pg_catalog.pg_inherits i ON c.oid = inhrelid\nWHERE c.oid = '{oid}';"
            ));
            if let Some(result) = self.query(&sql)? {
                if result.ntuples() > 0 {
                    let detached = if result.get(0, 2) == "t" { " DETACH PENDING" } else { "" };
                    table.add_footer(format!("Partition of: {} {}{detached}", result.get(0, 0), result.get(0, 1)));
                    if self.verbose {
                        match result.value(0, 3).filter(|c| !c.is_empty()) {
                            Some(constraint) => table.add_footer(format!("Partition constraint: {constraint}")),
                            None => table.add_footer("No partition constraint"),
                        }
                    }
                }
            }
        }

        if kind == 'p' {
            let sql = format!("SELECT pg_catalog.pg_get_partkeydef('{oid}'::pg_catalog.oid);");
            if let Some(result) = self.query(&sql)? {
                if result.ntuples() == 1 {
                    table.add_footer(format!("Partition key: {}", result.get(0, 0)));
                }
            }
        }

        if kind == 't' {
            let sql = format!(
                "SELECT n.nspname, c.relname\nFROM pg_catalog.pg_class c JOIN pg_catalog.pg_namespace n \
                 ON n.oid = c.relnamespace\nWHERE reltoastrelid = '{oid}';"
            );
            if let Some(result) = self.query(&sql)? {
                if result.ntuples() == 1 {
                    table.add_footer(format!("Owning table: \"{}.{}\"", result.get(0, 0), result.get(0, 1)));
                }
            }
        }

        if matches!(kind, 'i' | 'I') {
            self.index_footer(table, oid, schema, info)?;
        } else if matches!(kind, 'r' | 'm' | 'f' | 'p' | 't') {
            if info.has_index {
                self.index_list_footers(table, oid)?;
            }
            if info.checks > 0 {
                self.check_footers(table, oid)?;
            }
            self.foreign_key_footers(table, oid, kind)?;
            self.policy_footers(table, oid, info)?;
        }

        if matches!(kind, 'v' | 'm') && self.verbose {
            let sql = format!("SELECT pg_catalog.pg_get_viewdef('{oid}'::pg_catalog.oid, true);");
            if let Some(result) = self.query(&sql)? {
                if result.ntuples() > 0 {
                    table.add_footer("View definition:");
                    table.add_footer(result.get(0, 0));
                }
            }
        }

        if info.has_triggers {
            self.trigger_footers(table, oid)?;
        }

        if matches!(kind, 'r' | 'm' | 'f' | 'p' | 'I' | 't') {
            self.inheritance_footers(table, oid, info)?;
        }

        if self.verbose {
            if matches!(kind, 'r' | 'm') && !matches!(info.replident, 'd' | 'i') {
                let identity = if info.replident == 'f' { "FULL" } else { "NOTHING" };
                table.add_footer(format!("Replica Identity: {identity}"));
            }
            if matches!(kind, 'r' | 'm' | 'p' | 'i' | 'I') && !info.am.is_empty() && !self.session.vars.settings().hide_tableam
            {
                if !matches!(kind, 'i' | 'I') {
                    table.add_footer(format!("Access method: {}", info.am));
                }
            }
            if !info.reloptions.is_empty() {
                table.add_footer(format!("Options: {}", info.reloptions));
            }
        }
        if !info.of_type.is_empty() {
            table.add_footer(format!("Typed table of type: {}", info.of_type));
        }
        if !info.tablespace.is_empty() && matches!(kind, 'r' | 'm' | 'i' | 'p' | 'I' | 't') {
            table.add_footer(format!("Tablespace: \"{}\"", info.tablespace));
        }
        Ok(())
    }

    fn index_footer(&mut self, table: &mut Table, oid: &str, schema: &str, info: &TableInfo) -> Result<()> {
        let nulls = if self.at_least(150000) { "i.indnullsnotdistinct" } else { "false AS indnullsnotdistinct" };
        let sql = format!(
            "SELECT i.indisunique, i.indisprimary, i.indisclustered, i.indisvalid,\n  \
             (NOT i.indimmediate) AND EXISTS (SELECT 1 FROM pg_catalog.pg_constraint WHERE conrelid = i.indrelid AND \
             conindid = i.indexrelid AND contype IN ('p','u','x') AND condeferrable) AS condeferrable,\n  \
             (NOT i.indimmediate) AND EXISTS (SELECT 1 FROM pg_catalog.pg_constraint WHERE conrelid = i.indrelid AND \
             conindid = i.indexrelid AND contype IN ('p','u','x') AND condeferred) AS condeferred,\n\
             i.indisreplident,\n{nulls},\n  a.amname, c2.relname, pg_catalog.pg_get_expr(i.indpred, i.indrelid, true)\n\
             FROM pg_catalog.pg_index i, pg_catalog.pg_class c, pg_catalog.pg_class c2, pg_catalog.pg_am a\n\
             WHERE i.indexrelid = c.oid AND c.oid = '{oid}' AND c.relam = a.oid\nAND i.indrelid = c2.oid;"
        );
        let Some(result) = self.query(&sql)? else {
            return Ok(());
        };
        if result.ntuples() != 1 {
            return Ok(());
        }
        let flag = |col: usize| result.get(0, col) == "t";
        let mut text = String::new();
        if flag(1) {
            text.push_str("primary key, ");
        } else if flag(0) {
            text.push_str("unique");
            if flag(7) {
                text.push_str(" nulls not distinct");
            }
            text.push_str(", ");
        }
        text.push_str(&format!("{}, for table \"{schema}.{}\"", result.get(0, 8), result.get(0, 9)));
        let predicate = result.get(0, 10);
        if !predicate.is_empty() {
            text.push_str(&format!(", predicate ({predicate})"));
        }
        if flag(2) {
            text.push_str(", clustered");
        }
        if !flag(3) {
            text.push_str(", invalid");
        }
        if flag(4) {
            text.push_str(", deferrable");
        }
        if flag(5) {
            text.push_str(", initially deferred");
        }
        if flag(6) {
            text.push_str(", replica identity");
        }
        table.add_footer(text);
        if info.relkind == 'i' && !info.tablespace.is_empty() {
            table.add_footer(format!("Tablespace: \"{}\"", info.tablespace));
        }
        Ok(())
    }

    fn index_list_footers(&mut self, table: &mut Table, oid: &str) -> Result<()> {
        let period = if self.at_least(180000) { "con.conperiod" } else { "false AS conperiod" };
        let sql = format!(
            "SELECT c2.relname, i.indisprimary, i.indisunique, i.indisclustered, i.indisvalid, \
             pg_catalog.pg_get_indexdef(i.indexrelid, 0, true),\n  pg_catalog.pg_get_constraintdef(con.oid, true), \
             contype, condeferrable, condeferred, i.indisreplident, c2.reltablespace, {period}\n\
             FROM pg_catalog.pg_class c, pg_catalog.pg_class c2, pg_catalog.pg_index i\n  \
             LEFT JOIN pg_catalog.pg_constraint con ON (conrelid = i.indrelid AND conindid = i.indexrelid AND \
             contype IN ('p','u','x'))\n\
             WHERE c.oid = '{oid}' AND c.oid = i.indrelid AND i.indexrelid = c2.oid\n\
             ORDER BY i.indisprimary DESC, c2.relname;"
        );
        let Some(result) = self.query(&sql)? else {
            return Ok(());
        };
        if result.ntuples() == 0 {
            return Ok(());
        }
        table.add_footer("Indexes:");
        for row in 0..result.ntuples() {
            let flag = |col: usize| result.get(row, col) == "t";
            let mut line = format!("    \"{}\"", result.get(row, 0));
            if result.get(row, 7) == "x" || flag(12) {
                line.push_str(&format!(" {}", result.get(row, 6)));
            } else {
                if flag(1) {
                    line.push_str(" PRIMARY KEY,");
                } else if flag(2) {
                    line.push_str(if result.get(row, 7) == "u" { " UNIQUE CONSTRAINT," } else { " UNIQUE," });
                }
                let indexdef = result.get(row, 5);
                let indexdef = indexdef.split_once(" USING ").map_or(indexdef, |(_, rest)| rest);
                line.push_str(&format!(" {indexdef}"));
                if flag(8) {
                    line.push_str(" DEFERRABLE");
                }
                if flag(9) {
                    line.push_str(" INITIALLY DEFERRED");
                }
            }
            if flag(3) {
                line.push_str(" CLUSTER");
            }
            if !flag(4) {
                line.push_str(" INVALID");
            }
            if flag(10) {
                line.push_str(" REPLICA IDENTITY");
            }
            table.add_footer(line);
        }
        Ok(())
    }

    fn check_footers(&mut self, table: &mut Table, oid: &str) -> Result<()> {
        let sql = format!(
            "SELECT r.conname, pg_catalog.pg_get_constraintdef(r.oid, true)\n\
             FROM pg_catalog.pg_constraint r\n\
             WHERE r.conrelid = '{oid}' AND r.contype = 'c'\nORDER BY 1;"
        );
        if let Some(result) = self.query(&sql)? {
            if result.ntuples() > 0 {
                table.add_footer("Check constraints:");
                for row in 0..result.ntuples() {
                    table.add_footer(format!("    \"{}\" {}", result.get(row, 0), result.get(row, 1)));
                }
            }
        }
        Ok(())
    }

    fn foreign_key_footers(&mut self, table: &mut Table, oid: &str, kind: char) -> Result<()> {
        let sql = if kind == 'p' {
            format!(
                "SELECT conrelid = '{oid}'::pg_catalog.regclass AS sametable,\n       conname,\n       \
                 pg_catalog.pg_get_constraintdef(oid, true) AS condef,\n       conrelid::pg_catalog.regclass AS ontable\n  \
                 FROM pg_catalog.pg_constraint,\n       pg_catalog.pg_partition_ancestors('{oid}')\n \
                 WHERE conrelid = relid AND contype = 'f' AND conparentid = 0\nORDER BY sametable DESC, conname;"
            )
        } else {
            format!(
                "SELECT true as sametable, conname,\n  pg_catalog.pg_get_constraintdef(r.oid, true) as condef,\n  \
                 conrelid::pg_catalog.regclass AS ontable\nFROM pg_catalog.pg_constraint r\n\
                 WHERE r.conrelid = '{oid}' AND r.contype = 'f'\n     AND conparentid = 0\nORDER BY conname"
            )
        };
        if let Some(result) = self.query(&sql)? {
            if result.ntuples() > 0 {
                table.add_footer("Foreign-key constraints:");
                for row in 0..result.ntuples() {
                    let (same, name, def, on) =
                        (result.get(row, 0), result.get(row, 1), result.get(row, 2), result.get(row, 3));
                    match same {
                        "f" => table.add_footer(format!("    TABLE \"{on}\" CONSTRAINT \"{name}\" {def}")),
                        _ => table.add_footer(format!("    \"{name}\" {def}")),
                    }
                }
            }
        }

        let sql = format!(
            "SELECT conname, conrelid::pg_catalog.regclass AS ontable,\n       \
             pg_catalog.pg_get_constraintdef(oid, true) AS condef\n  FROM pg_catalog.pg_constraint c\n \
             WHERE confrelid IN (SELECT pg_catalog.pg_partition_ancestors('{oid}')\n                     \
             UNION ALL VALUES ('{oid}'::pg_catalog.regclass))\n       AND contype = 'f' AND conparentid = 0\n\
             ORDER BY conname;"
        );
        if let Some(result) = self.query(&sql)? {
            if result.ntuples() > 0 {
                table.add_footer("Referenced by:");
                for row in 0..result.ntuples() {
                    table.add_footer(format!(
                        "    TABLE \"{}\" CONSTRAINT \"{}\" {}",
                        result.get(row, 1),
                        result.get(row, 0),
                        result.get(row, 2)
                    ));
                }
            }
        }
        Ok(())
    }

    fn policy_footers(&mut self, table: &mut Table, oid: &str, info: &TableInfo) -> Result<()> {
        let sql = format!(
            "SELECT pol.polname, pol.polpermissive,\n  \
             CASE WHEN pol.polroles = '{{0}}' THEN NULL ELSE pg_catalog.array_to_string(array(select rolname from \
             pg_catalog.pg_roles where oid = any (pol.polroles) order by 1),',') END,\n  \
             pg_catalog.pg_get_expr(pol.polqual, pol.polrelid),\n  \
             pg_catalog.pg_get_expr(pol.polwithcheck, pol.polrelid),\n  \
             CASE pol.polcmd\n    WHEN 'r' THEN 'SELECT'\n    WHEN 'a' THEN 'INSERT'\n    WHEN 'w' THEN 'UPDATE'\n    \
             WHEN 'd' THEN 'DELETE'\n    END AS cmd\n\
             FROM pg_catalog.pg_policy pol\nWHERE pol.polrelid = '{oid}' ORDER BY 1;"
        );
        let Some(result) = self.query(&sql)? else {
            return Ok(());
        };
        let count = result.ntuples();
        let heading = match (info.row_security, info.force_row_security, count > 0) {
            (true, false, true) => Some("Policies:"),
            (true, true, true) => Some("Policies (forced row security enabled):"),
            (true, false, false) => Some("Policies (row security enabled): (none)"),
            (true, true, false) => Some("Policies (forced row security enabled): (none)"),
            (false, _, true) => Some("Policies (row security disabled):"),
            (false, _, false) => None,
        };
        if let Some(heading) = heading {
            table.add_footer(heading);
        }
        for row in 0..count {
            let mut line = format!("    POLICY \"{}\"", result.get(row, 0));
            if result.get(row, 1) == "f" {
                line.push_str(" AS RESTRICTIVE");
            }
            if let Some(cmd) = result.value(row, 5) {
                line.push_str(&format!("\n      FOR {cmd}"));
            }
            if let Some(roles) = result.value(row, 2) {
                line.push_str(&format!("\n      TO {roles}"));
            }
            if let Some(using) = result.value(row, 3) {
                line.push_str(&format!("\n      USING ({using})"));
            }
            if let Some(check) = result.value(row, 4) {
                line.push_str(&format!("\n      WITH CHECK ({check})"));
            }
            table.add_footer(line);
        }
        Ok(())
    }

    fn trigger_footers(&mut self, table: &mut Table, oid: &str) -> Result<()> {
        let sql = format!(
            "SELECT t.tgname, pg_catalog.pg_get_triggerdef(t.oid, true), t.tgenabled, t.tgisinternal,\n  \
             CASE WHEN t.tgparentid != 0 THEN\n    (SELECT u.tgrelid::pg_catalog.regclass\n     \
             FROM pg_catalog.pg_trigger AS u,\n          \
             pg_catalog.pg_partition_ancestors(t.tgrelid) WITH ORDINALITY AS a(relid, depth)\n     \
             WHERE u.tgname = t.tgname AND u.tgrelid = a.relid\n           AND u.tgparentid = 0\n     \
             ORDER BY a.depth LIMIT 1)\n  END AS parent\n\
             FROM pg_catalog.pg_trigger t\n\
             WHERE t.tgrelid = '{oid}' AND (NOT t.tgisinternal OR (t.tgisinternal AND t.tgenabled = 'D'))\nORDER BY 1;"
        );
        let Some(result) = self.query(&sql)? else {
            return Ok(());
        };
        let categories: [(&str, fn(&str, &str) -> bool); 5] = [
            ("Triggers:", |enabled, _| matches!(enabled, "O" | "t")),
            ("Disabled user triggers:", |enabled, internal| matches!(enabled, "D" | "f") && internal == "f"),
            ("Disabled internal triggers:", |enabled, internal| matches!(enabled, "D" | "f") && internal == "t"),
            ("Triggers firing always:", |enabled, _| enabled == "A"),
            ("Triggers firing on replica only:", |enabled, _| enabled == "R"),
        ];
        for (heading, belongs) in categories {
            let mut have_heading = false;
            for row in 0..result.ntuples() {
                if !belongs(result.get(row, 2), result.get(row, 3)) {
                    continue;
                }
                if !have_heading {
                    table.add_footer(heading);
                    have_heading = true;
                }
                let def = result.get(row, 1);
                let def = def.split_once(" TRIGGER ").map_or(def, |(_, rest)| rest);
                let mut line = format!("    {def}");
                if let Some(parent) = result.value(row, 4) {
                    line.push_str(&format!(", ON TABLE {parent}"));
                }
                table.add_footer(line);
            }
        }
        Ok(())
    }

    fn inheritance_footers(&mut self, table: &mut Table, oid: &str, info: &TableInfo) -> Result<()> {
        let kind = info.relkind;
        if kind == 'f' {
            let sql = format!(
                "SELECT s.srvname,\n  pg_catalog.array_to_string(ARRAY(\n    \
                 SELECT pg_catalog.quote_ident(option_name) || ' ' || pg_catalog.quote_literal(option_value)\n    \
                 FROM pg_catalog.pg_options_to_table(ftoptions)),  ', ')\n\
                 FROM pg_catalog.pg_foreign_table f,\n     pg_catalog.pg_foreign_server s\n\
                 WHERE f.ftrelid = '{oid}' AND s.oid = f.ftserver;"
            );
            if let Some(result) = self.query(&sql)? {
                if result.ntuples() == 1 {
                    table.add_footer(format!("Server: {}", result.get(0, 0)));
                    let options = result.get(0, 1);
                    if !options.is_empty() {
                        table.add_footer(format!("FDW options: ({options})"));
                    }
                }
            }
        }

        let sql = format!(
            "SELECT c.oid::pg_catalog.regclass\nFROM pg_catalog.pg_class c, pg_catalog.pg_inherits i\n\
             WHERE c.oid = i.inhparent AND i.inhrelid = '{oid}'\n  AND c.relkind != 'p' AND c.relkind != 'I'\n\
             ORDER BY inhseqno;"
        );
        if let Some(result) = self.query(&sql)? {
            let parents: Vec<String> = (0..result.ntuples()).map(|row| result.get(row, 0).to_owned()).collect();
            for line in indented_list("Inherits", &parents) {
                table.add_footer(line);
            }
        }

        let sql = format!(
            "SELECT c.oid::pg_catalog.regclass, c.relkind, inhdetachpending, pg_catalog.pg_get_expr(c.relpartbound, c.oid)\n\
             FROM pg_catalog.pg_class c, pg_catalog.pg_inherits i\n\
             WHERE c.oid = i.inhrelid AND i.inhparent = '{oid}'\n\
             ORDER BY pg_catalog.pg_get_expr(c.relpartbound, c.oid) = 'DEFAULT', c.oid::pg_catalog.regclass::pg_catalog.text;"
        );
        let Some(result) = self.query(&sql)? else {
            return Ok(());
        };
        let partitioned = matches!(kind, 'p' | 'I');
        let count = result.ntuples();
        if partitioned && count == 0 {
            table.add_footer("Number of partitions: 0");
        } else if !self.verbose {
            if count > 0 {
                let what = if partitioned { "partitions" } else { "child tables" };
                table.add_footer(format!("Number of {what}: {count} (Use \\d+ to list them.)"));
            }
        } else {
            let children: Vec<String> = (0..count)
                .map(|row| {
                    let mut child = result.get(row, 0).to_owned();
                    if let Some(bound) = result.value(row, 3) {
                        child.push_str(&format!(" {bound}"));
                    }
                    match result.get(row, 1) {
                        "p" | "I" => child.push_str(", PARTITIONED"),
                        "f" => child.push_str(", FOREIGN"),
                        _ => {}
                    }
                    if result.get(row, 2) == "t" {
                        child.push_str(" (DETACH PENDING)");
                    }
                    child
                })
                .collect();
            let label = if partitioned { "Partitions" } else { "Child tables" };
            for line in indented_list(label, &children) {
                table.add_footer(line);
            }
        }
        Ok(())
    }
}

/// General facts about one relation.
struct TableInfo {
    checks: i32,
    relkind: char,
    has_index: bool,
    has_triggers: bool,
    row_security: bool,
    force_row_security: bool,
    is_partition: bool,
    reloptions: String,
    tablespace: String,
    of_type: String,
    persistence: char,
    replident: char,
    am: String,
}

/// `Label: first,` followed by the rest aligned under the first item.
fn indented_list(label: &str, items: &[String]) -> Vec<String> {
    let pad = " ".repeat(label.chars().count());
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let comma = if i + 1 < items.len() { "," } else { "" };
            match i {
                0 => format!("{label}: {item}{comma}"),
                _ => format!("{pad}  {item}{comma}"),
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn modifiers() {
        assert_eq!(split_modifiers("dtS+"), ("dt".into(), true, true));
        assert_eq!(split_modifiers("d+"), ("d".into(), true, false));
        assert_eq!(split_modifiers("dS"), ("d".into(), false, true));
        assert_eq!(split_modifiers("dconfig"), ("dconfig".into(), false, false));
        assert_eq!(split_modifiers("lo_list+"), ("lo_list".into(), true, false));
    }

    #[test]
    fn relation_kind_letters() {
        assert_eq!(relation_kinds("tv"), Some("tv"));
        assert_eq!(relation_kinds("E"), Some("E"));
        assert_eq!(relation_kinds("x"), None);
        assert_eq!(relation_kinds("es"), None);
    }

    #[test]
    fn type_name_aliases() {
        assert_eq!(map_type_name(Some("INT")).as_deref(), Some("integer"));
        assert_eq!(map_type_name(Some("varchar[]")).as_deref(), Some("character varying[]"));
        assert_eq!(map_type_name(Some("text")).as_deref(), Some("text"));
        assert_eq!(map_type_name(None), None);
    }

    #[test]
    fn aligned_lists() {
        let items = vec!["a".to_owned(), "b".to_owned()];
        assert_eq!(indented_list("Inherits", &items), ["Inherits: a,", "          b"]);
        assert!(indented_list("Inherits", &[]).is_empty());
    }

    fn session() -> Session {
        use crate::{input::Input, variables::Variables};
        Session::new(Variables::with_defaults(), Input::script("", None), false).unwrap()
    }

    #[test]
    fn pattern_checked_before_connecting() {
        let mut session = session();
        let mut d = Describe::new(&mut session, false, false);
        let err = d.list_relations("t", Some("a.b.c.d")).unwrap_err();
        assert_eq!(err.to_string(), "improper qualified name (too many dotted names): a.b.c.d");

        let err = d.describe_tables("db.s.t").unwrap_err();
        assert_eq!(err.to_string(), "You are currently not connected to a database.");

        let err = d.list_roles(Some("a.b")).unwrap_err();
        assert_eq!(err.to_string(), "improper qualified name (too many dotted names): a.b");

        let err = d.list_functions("q", None, &[]).unwrap_err();
        assert_eq!(err.to_string(), "\\df only takes [anptwS+] as options");
    }

    #[test]
    fn no_connection_after_valid_pattern() {
        let mut session = session();
        let mut d = Describe::new(&mut session, false, false);
        let err = d.list_relations("t", Some("public.t")).unwrap_err();
        assert!(matches!(err.kind(), crate::ErrorKind::NoConnection));
    }

    #[test]
    fn acl_and_options() {
        assert!(acl_column("c.relacl").ends_with("AS \"Access privileges\""));
        assert!(options_column("ftoptions", "FDW options").contains("pg_options_to_table(ftoptions)"));
    }
}
