//! `--help`, `\?`, `\h` and `\copyright`.
use std::io;

use crate::{
    print::{pager, Expanded, Format, PrintOptions},
    session::Session,
    Result,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const DOCS_URL: &str = "https://www.postgresql.org/docs/current";

/// SQL commands `\h` knows about.
const SQL_COMMANDS: &[&str] = &[
    "ABORT", "ALTER AGGREGATE", "ALTER COLLATION", "ALTER CONVERSION", "ALTER DATABASE",
    "ALTER DEFAULT PRIVILEGES", "ALTER DOMAIN", "ALTER EVENT TRIGGER", "ALTER EXTENSION",
    "ALTER FOREIGN DATA WRAPPER", "ALTER FOREIGN TABLE", "ALTER FUNCTION", "ALTER GROUP",
    "ALTER INDEX", "ALTER LANGUAGE", "ALTER LARGE OBJECT", "ALTER MATERIALIZED VIEW",
    "ALTER OPERATOR", "ALTER OPERATOR CLASS", "ALTER OPERATOR FAMILY", "ALTER POLICY",
    "ALTER PROCEDURE", "ALTER PUBLICATION", "ALTER ROLE", "ALTER ROUTINE", "ALTER RULE",
    "ALTER SCHEMA", "ALTER SEQUENCE", "ALTER SERVER", "ALTER STATISTICS", "ALTER SUBSCRIPTION",
    "ALTER SYSTEM", "ALTER TABLE", "ALTER TABLESPACE", "ALTER TEXT SEARCH CONFIGURATION",
    "ALTER TEXT SEARCH DICTIONARY", "ALTER TEXT SEARCH PARSER", "ALTER TEXT SEARCH TEMPLATE",
    "ALTER TRIGGER", "ALTER TYPE", "ALTER USER", "ALTER USER MAPPING", "ALTER VIEW", "ANALYZE",
    "BEGIN", "CALL", "CHECKPOINT", "CLOSE", "CLUSTER", "COMMENT", "COMMIT", "COMMIT PREPARED",
    "COPY", "CREATE ACCESS METHOD", "CREATE AGGREGATE", "CREATE CAST", "CREATE COLLATION",
    "CREATE CONVERSION", "CREATE DATABASE", "CREATE DOMAIN", "CREATE EVENT TRIGGER",
    "CREATE EXTENSION", "CREATE FOREIGN DATA WRAPPER", "CREATE FOREIGN TABLE", "CREATE FUNCTION",
    "CREATE GROUP", "CREATE INDEX", "CREATE LANGUAGE", "CREATE MATERIALIZED VIEW",
    "CREATE OPERATOR", "CREATE OPERATOR CLASS", "CREATE OPERATOR FAMILY", "CREATE POLICY",
    "CREATE PROCEDURE", "CREATE PUBLICATION", "CREATE ROLE", "CREATE RULE", "CREATE SCHEMA",
    "CREATE SEQUENCE", "CREATE SERVER", "CREATE STATISTICS", "CREATE SUBSCRIPTION",
    "CREATE TABLE", "CREATE TABLE AS", "CREATE TABLESPACE", "CREATE TEXT SEARCH CONFIGURATION",
    "CREATE TEXT SEARCH DICTIONARY", "CREATE TEXT SEARCH PARSER", "CREATE TEXT SEARCH TEMPLATE",
    "CREATE TRANSFORM", "CREATE TRIGGER", "CREATE TYPE", "CREATE USER", "CREATE USER MAPPING",
    "CREATE VIEW", "DEALLOCATE", "DECLARE", "DELETE", "DISCARD", "DO", "DROP ACCESS METHOD",
    "DROP AGGREGATE", "DROP CAST", "DROP COLLATION", "DROP CONVERSION", "DROP DATABASE",
    "DROP DOMAIN", "DROP EVENT TRIGGER", "DROP EXTENSION", "DROP FOREIGN DATA WRAPPER",
    "DROP FOREIGN TABLE", "DROP FUNCTION", "DROP GROUP", "DROP INDEX", "DROP LANGUAGE",
    "DROP MATERIALIZED VIEW", "DROP OPERATOR", "DROP OPERATOR CLASS", "DROP OPERATOR FAMILY",
    "DROP OWNED", "DROP POLICY", "DROP PROCEDURE", "DROP PUBLICATION", "DROP ROLE",
    "DROP ROUTINE", "DROP RULE", "DROP SCHEMA", "DROP SEQUENCE", "DROP SERVER",
    "DROP STATISTICS", "DROP SUBSCRIPTION", "DROP TABLE", "DROP TABLESPACE",
    "DROP TEXT SEARCH CONFIGURATION", "DROP TEXT SEARCH DICTIONARY", "DROP TEXT SEARCH PARSER",
    "DROP TEXT SEARCH TEMPLATE", "DROP TRANSFORM", "DROP TRIGGER", "DROP TYPE", "DROP USER",
    "DROP USER MAPPING", "DROP VIEW", "END", "EXECUTE", "EXPLAIN", "FETCH", "GRANT",
    "IMPORT FOREIGN SCHEMA", "INSERT", "LISTEN", "LOAD", "LOCK", "MERGE", "MOVE", "NOTIFY",
    "PREPARE", "PREPARE TRANSACTION", "REASSIGN OWNED", "REFRESH MATERIALIZED VIEW", "REINDEX",
    "RELEASE SAVEPOINT", "RESET", "REVOKE", "ROLLBACK", "ROLLBACK PREPARED",
    "ROLLBACK TO SAVEPOINT", "SAVEPOINT", "SECURITY LABEL", "SELECT", "SELECT INTO", "SET",
    "SET CONSTRAINTS", "SET ROLE", "SET SESSION AUTHORIZATION", "SET TRANSACTION", "SHOW",
    "START TRANSACTION", "TABLE", "TRUNCATE", "UNLISTEN", "UPDATE", "VACUUM", "VALUES", "WITH",
];

fn on(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

/// Command line usage, `--help`.
pub fn usage_text() -> String {
    format!(
        "postro-term is an interactive terminal for Postgres.\n\
\n\
Usage:\n\
\x20 postro-term [OPTION]... [DBNAME [USERNAME]]\n\
\n\
General options:\n\
\x20 -c, --command=COMMAND    run only single command (SQL or internal) and exit\n\
\x20 -d, --dbname=DBNAME      database name to connect to\n\
\x20 -f, --file=FILENAME      execute commands from file, then exit\n\
\x20 -l, --list               list available databases, then exit\n\
\x20 -v, --set=, --variable=NAME=VALUE\n\
\x20                          set variable NAME to VALUE\n\
\x20                          (e.g., -v ON_ERROR_STOP=1)\n\
\x20 -V, --version            output version information, then exit\n\
\x20 -X, --no-psqlrc          do not read startup file (~/.psqlrc)\n\
\x20 -1 (\"one\"), --single-transaction\n\
\x20                          execute as a single transaction (if non-interactive)\n\
\x20 -?, --help[=options]     show this help, then exit\n\
\x20     --help=commands      list backslash commands, then exit\n\
\x20     --help=variables     list special variables, then exit\n\
\n\
Input and output options:\n\
\x20 -a, --echo-all           echo all input from script\n\
\x20 -b, --echo-errors        echo failed commands\n\
\x20 -e, --echo-queries       echo commands sent to server\n\
\x20 -E, --echo-hidden        display queries that internal commands generate\n\
\x20 -L, --log-file=FILENAME  send session log to file\n\
\x20 -n, --no-readline        disable enhanced command line editing\n\
\x20 -o, --output=FILENAME    send query results to file (or |pipe)\n\
\x20 -q, --quiet              run quietly (no messages, only query output)\n\
\x20 -s, --single-step        single-step mode (confirm each query)\n\
\x20 -S, --single-line        single-line mode (end of line terminates SQL command)\n\
\n\
Output format options:\n\
\x20 -A, --no-align           unaligned table output mode\n\
\x20     --csv                CSV (Comma-Separated Values) table output mode\n\
\x20 -F, --field-separator=STRING\n\
\x20                          field separator for unaligned output (default: \"|\")\n\
\x20 -H, --html               HTML table output mode\n\
\x20 -P, --pset=VAR[=ARG]     set printing option VAR to ARG (see \\pset command)\n\
\x20 -R, --record-separator=STRING\n\
\x20                          record separator for unaligned output (default: newline)\n\
\x20 -t, --tuples-only        print rows only\n\
\x20 -T, --table-attr=TEXT    set HTML table tag attributes (e.g., width, border)\n\
\x20 -x, --expanded           turn on expanded table output\n\
\x20 -z, --field-separator-zero\n\
\x20                          set field separator for unaligned output to zero byte\n\
\x20 -0, --record-separator-zero\n\
\x20                          set record separator for unaligned output to zero byte\n\
\n\
Connection options:\n\
\x20 -h, --host=HOSTNAME      database server host or socket directory\n\
\x20 -p, --port=PORT          database server port\n\
\x20 -U, --username=USERNAME  database user name\n\
\x20 -w, --no-password        never prompt for password\n\
\x20 -W, --password           force password prompt (should happen automatically)\n\
\n\
For more information, type \"\\?\" (for internal commands) or \"\\help\" (for SQL\n\
commands) from within postro-term.\n\
\n\
postro-term {VERSION}\n"
    )
}

/// Backslash command summary, `\?`.
pub fn commands_text(popt: &PrintOptions, dbname: Option<&str>, timing: bool) -> String {
    let expanded = match popt.expanded {
        Expanded::Auto => "auto",
        Expanded::On => "on",
        Expanded::Off => "off",
    };
    let current = match dbname {
        Some(db) => format!("currently \"{db}\""),
        None => "currently no connection".to_owned(),
    };
    let mut text = String::from(
        "General\n\
\x20 \\copyright             show usage and distribution terms\n\
\x20 \\crosstabview [COLUMNS] execute query and display result in crosstab\n\
\x20 \\errverbose            show most recent error message at maximum verbosity\n\
\x20 \\g [(OPTIONS)] [FILE]  execute query (and send result to file or |pipe);\n\
\x20                        \\g with no arguments is equivalent to a semicolon\n\
\x20 \\gdesc                 describe result of query, without executing it\n\
\x20 \\gexec                 execute query, then execute each value in its result\n\
\x20 \\gset [PREFIX]         execute query and store result in variables\n\
\x20 \\gx [(OPTIONS)] [FILE] as \\g, but forces expanded output mode\n\
\x20 \\q                     quit postro-term\n\
\x20 \\watch [[i=]SEC] [c=N] [m=MIN]\n\
\x20                        execute query every SEC seconds, up to N times,\n\
\x20                        stop if less than MIN rows are returned\n\
\n\
Help\n\
\x20 \\? [commands]          show help on backslash commands\n\
\x20 \\? options             show help on command-line options\n\
\x20 \\? variables           show help on special variables\n\
\x20 \\h [NAME]              help on syntax of SQL commands, * for all commands\n\
\n\
Query Buffer\n\
\x20 \\e [FILE] [LINE]       edit the query buffer (or file) with external editor\n\
\x20 \\ef [FUNCNAME [LINE]]  edit function definition with external editor\n\
\x20 \\ev [VIEWNAME [LINE]]  edit view definition with external editor\n\
\x20 \\p                     show the contents of the query buffer\n\
\x20 \\r                     reset (clear) the query buffer\n\
\x20 \\s [FILE]              display history or save it to file\n\
\x20 \\w FILE                write query buffer to file\n\
\n\
Input/Output\n\
\x20 \\copy ...              perform SQL COPY with data stream to the client host\n\
\x20 \\echo [-n] [STRING]    write string to standard output (-n for no newline)\n\
\x20 \\i FILE                execute commands from file\n\
\x20 \\ir FILE               as \\i, but relative to location of current script\n\
\x20 \\o [FILE]              send all query results to file or |pipe\n\
\x20 \\qecho [-n] [STRING]   write string to \\o output stream (-n for no newline)\n\
\x20 \\warn [-n] [STRING]    write string to standard error (-n for no newline)\n\
\n\
Conditional\n\
\x20 \\if EXPR               begin conditional block\n\
\x20 \\elif EXPR             alternative within current conditional block\n\
\x20 \\else                  final alternative within current conditional block\n\
\x20 \\endif                 end conditional block\n\
\n\
Informational\n\
\x20 (options: S = show system objects, + = additional detail)\n\
\x20 \\d[S+]                 list tables, views, and sequences\n\
\x20 \\d[S+]  NAME           describe table, view, sequence, or index\n\
\x20 \\da[S]  [PATTERN]      list aggregates\n\
\x20 \\dA[+]  [PATTERN]      list access methods\n\
\x20 \\db[+]  [PATTERN]      list tablespaces\n\
\x20 \\dc[S+] [PATTERN]      list conversions\n\
\x20 \\dconfig[+] [PATTERN]  list configuration parameters\n\
\x20 \\dC[+]  [PATTERN]      list casts\n\
\x20 \\dd[S]  [PATTERN]      show object descriptions not displayed elsewhere\n\
\x20 \\dD[S+] [PATTERN]      list domains\n\
\x20 \\ddp    [PATTERN]      list default privileges\n\
\x20 \\dE[S+] [PATTERN]      list foreign tables\n\
\x20 \\des[+] [PATTERN]      list foreign servers\n\
\x20 \\det[+] [PATTERN]      list foreign tables\n\
\x20 \\deu[+] [PATTERN]      list user mappings\n\
\x20 \\dew[+] [PATTERN]      list foreign-data wrappers\n\
\x20 \\df[anptw][S+] [FUNCPTRN [TYPEPTRN ...]]\n\
\x20                        list [only agg/normal/procedure/trigger/window] functions\n\
\x20 \\dF[+]  [PATTERN]      list text search configurations\n\
\x20 \\dFd[+] [PATTERN]      list text search dictionaries\n\
\x20 \\dFp[+] [PATTERN]      list text search parsers\n\
\x20 \\dFt[+] [PATTERN]      list text search templates\n\
\x20 \\dg[S+] [PATTERN]      list roles\n\
\x20 \\di[S+] [PATTERN]      list indexes\n\
\x20 \\dl[+]                 list large objects, same as \\lo_list\n\
\x20 \\dL[S+] [PATTERN]      list procedural languages\n\
\x20 \\dm[S+] [PATTERN]      list materialized views\n\
\x20 \\dn[S+] [PATTERN]      list schemas\n\
\x20 \\do[S+] [OPPTRN [TYPEPTRN [TYPEPTRN]]]\n\
\x20                        list operators\n\
\x20 \\dO[S+] [PATTERN]      list collations\n\
\x20 \\dp[S]  [PATTERN]      list table, view, and sequence access privileges\n\
\x20 \\drds [ROLEPTRN [DBPTRN]]\n\
\x20                        list per-database role settings\n\
\x20 \\drg[S] [PATTERN]      list role grants\n\
\x20 \\dRp[+] [PATTERN]      list replication publications\n\
\x20 \\dRs[+] [PATTERN]      list replication subscriptions\n\
\x20 \\ds[S+] [PATTERN]      list sequences\n\
\x20 \\dt[S+] [PATTERN]      list tables\n\
\x20 \\dT[S+] [PATTERN]      list data types\n\
\x20 \\du[S+] [PATTERN]      list roles\n\
\x20 \\dv[S+] [PATTERN]      list views\n\
\x20 \\dx[+]  [PATTERN]      list extensions\n\
\x20 \\dX     [PATTERN]      list extended statistics\n\
\x20 \\dy[+]  [PATTERN]      list event triggers\n\
\x20 \\l[+]   [PATTERN]      list databases\n\
\x20 \\sf[+]  FUNCNAME       show a function's definition\n\
\x20 \\sv[+]  VIEWNAME       show a view's definition\n\
\x20 \\z[S]   [PATTERN]      same as \\dp\n\
\n\
Large Objects\n\
\x20 \\lo_export LOBOID FILE write large object to file\n\
\x20 \\lo_import FILE [COMMENT]\n\
\x20                        read large object from file\n\
\x20 \\lo_list[+]            list large objects\n\
\x20 \\lo_unlink LOBOID      delete a large object\n\
\n",
    );
    text.push_str(&format!(
        "Formatting\n\
\x20 \\a                     toggle between unaligned and aligned output mode\n\
\x20 \\C [STRING]            set table title, or unset if none\n\
\x20 \\f [STRING]            show or set field separator for unaligned query output\n\
\x20 \\H                     toggle HTML output mode (currently {html})\n\
\x20 \\pset [NAME [VALUE]]   set table output option\n\
\x20                        (border|columns|csv_fieldsep|expanded|fieldsep|\n\
\x20                        fieldsep_zero|footer|format|linestyle|null|\n\
\x20                        numericlocale|pager|pager_min_lines|recordsep|\n\
\x20                        recordsep_zero|tableattr|title|tuples_only|\n\
\x20                        unicode_border_linestyle|unicode_column_linestyle|\n\
\x20                        unicode_header_linestyle|xheader_width)\n\
\x20 \\t [on|off]            show only rows (currently {tuples})\n\
\x20 \\T [STRING]            set HTML <table> tag attributes, or unset if none\n\
\x20 \\x [on|off|auto]       toggle expanded output (currently {expanded})\n\
\n\
Connection\n\
\x20 \\c[onnect] {{[DBNAME|- USER|- HOST|- PORT|-] | conninfo}}\n\
\x20                        connect to new database ({current})\n\
\x20 \\conninfo              display information about current connection\n\
\x20 \\encoding [ENCODING]   show or set client encoding\n\
\x20 \\password [USERNAME]   securely change the password for a user\n\
\n\
Operating System\n\
\x20 \\cd [DIR]              change the current working directory\n\
\x20 \\getenv VAR ENVVAR     fetch environment variable\n\
\x20 \\setenv NAME [VALUE]   set or unset environment variable\n\
\x20 \\timing [on|off]       toggle timing of commands (currently {timing})\n\
\x20 \\! [COMMAND]           execute command in shell or start interactive shell\n\
\n\
Variables\n\
\x20 \\prompt [TEXT] NAME    prompt user to set internal variable\n\
\x20 \\set [NAME [VALUE]]    set internal variable, or list all if no parameters\n\
\x20 \\unset NAME            unset (delete) internal variable\n\
\n\
Extended Query Protocol\n\
\x20 \\bind [PARAM]...       set query parameters\n\
\x20 \\bind_named STMT_NAME [PARAM]...\n\
\x20                        set query parameters for an existing prepared statement\n\
\x20 \\close_prepared STMT_NAME\n\
\x20                        close an existing prepared statement\n\
\x20 \\endpipeline           exit pipeline mode\n\
\x20 \\flush                 flush output data to the server\n\
\x20 \\flushrequest          send request to the server to flush its output buffer\n\
\x20 \\getresults [NUM_RES]  read NUM_RES pending results, or all if no argument\n\
\x20 \\parse STMT_NAME       create a prepared statement\n\
\x20 \\sendpipeline          send an extended query to an ongoing pipeline\n\
\x20 \\startpipeline         enter pipeline mode\n\
\x20 \\syncpipeline          add a synchronisation point to an ongoing pipeline\n",
        html = on(popt.format == Format::Html),
        tuples = on(popt.tuples_only),
        timing = on(timing),
    ));
    text
}

/// Special variables, `\? variables`.
pub fn variables_text() -> String {
    String::from(
        "List of specially treated variables\n\
\n\
Variables:\n\
Usage:\n\
\x20 postro-term --set=NAME=VALUE\n\
\x20 or \\set NAME VALUE inside postro-term\n\
\n\
\x20 AUTOCOMMIT\n\
\x20   if set, successful SQL commands are automatically committed\n\
\x20 COMP_KEYWORD_CASE\n\
\x20   determines the case used to complete SQL key words\n\
\x20   [lower, upper, preserve-lower, preserve-upper]\n\
\x20 DBNAME\n\
\x20   the currently connected database name\n\
\x20 ECHO\n\
\x20   controls what input is written to standard output\n\
\x20   [all, errors, none, queries]\n\
\x20 ECHO_HIDDEN\n\
\x20   if set, display internal queries executed by backslash commands;\n\
\x20   if set to \"noexec\", just show them without execution\n\
\x20 ENCODING\n\
\x20   current client character set encoding\n\
\x20 ERROR\n\
\x20   \"true\" if last query failed, else \"false\"\n\
\x20 FETCH_COUNT\n\
\x20   the number of result rows to fetch and display at a time (0 = unlimited)\n\
\x20 HIDE_TABLEAM\n\
\x20   if set, table access methods are not displayed\n\
\x20 HIDE_TOAST_COMPRESSION\n\
\x20   if set, compression methods are not displayed\n\
\x20 HISTCONTROL\n\
\x20   controls command history [ignorespace, ignoredups, ignoreboth]\n\
\x20 HISTFILE\n\
\x20   file name used to store the command history\n\
\x20 HISTSIZE\n\
\x20   maximum number of commands to store in the command history\n\
\x20 HOST\n\
\x20   the currently connected database server host\n\
\x20 IGNOREEOF\n\
\x20   number of EOFs needed to terminate an interactive session\n\
\x20 LASTOID\n\
\x20   value of the last affected OID\n\
\x20 LAST_ERROR_MESSAGE\n\
\x20 LAST_ERROR_SQLSTATE\n\
\x20   message and SQLSTATE of last error, or empty string and \"00000\" if none\n\
\x20 ON_ERROR_ROLLBACK\n\
\x20   if set, an error doesn't stop a transaction (uses implicit savepoints)\n\
\x20 ON_ERROR_STOP\n\
\x20   stop batch execution after error\n\
\x20 PORT\n\
\x20   server port of the current connection\n\
\x20 PROMPT1\n\
\x20   specifies the standard prompt\n\
\x20 PROMPT2\n\
\x20   specifies the prompt used when a statement continues from a previous line\n\
\x20 PROMPT3\n\
\x20   specifies the prompt used during COPY ... FROM STDIN\n\
\x20 QUIET\n\
\x20   run quietly (same as -q option)\n\
\x20 ROW_COUNT\n\
\x20   number of rows returned or affected by last query, or 0\n\
\x20 SERVER_VERSION_NAME\n\
\x20 SERVER_VERSION_NUM\n\
\x20   server's version (in short string or numeric format)\n\
\x20 SHELL_ERROR\n\
\x20   \"true\" if the last shell command failed, \"false\" if it succeeded\n\
\x20 SHELL_EXIT_CODE\n\
\x20   exit status of the last shell command\n\
\x20 SHOW_ALL_RESULTS\n\
\x20   show all results of a combined query (\\;) instead of only the last\n\
\x20 SHOW_CONTEXT\n\
\x20   controls display of message context fields [never, errors, always]\n\
\x20 SINGLELINE\n\
\x20   if set, end of line terminates SQL commands (same as -S option)\n\
\x20 SINGLESTEP\n\
\x20   single-step mode (same as -s option)\n\
\x20 SQLSTATE\n\
\x20   SQLSTATE of last query, or \"00000\" if no error\n\
\x20 USER\n\
\x20   the currently connected database user\n\
\x20 VERBOSITY\n\
\x20   controls verbosity of error reports [default, verbose, terse, sqlstate]\n\
\x20 VERSION\n\
\x20 VERSION_NAME\n\
\x20 VERSION_NUM\n\
\x20   postro-term's version (in verbose string, short string, or numeric format)\n\
\x20 WATCH_INTERVAL\n\
\x20   number of seconds \\watch waits between executions (default 2)\n\
\n\
Display settings:\n\
Usage:\n\
\x20 postro-term --pset=NAME[=VALUE]\n\
\x20 or \\pset NAME [VALUE] inside postro-term\n\
\n\
\x20 border\n\
\x20   border style (number)\n\
\x20 columns\n\
\x20   target width for the wrapped format\n\
\x20 expanded (or x)\n\
\x20   expanded output [on, off, auto]\n\
\x20 fieldsep\n\
\x20   field separator for unaligned output (default \"|\")\n\
\x20 fieldsep_zero\n\
\x20   set field separator for unaligned output to a zero byte\n\
\x20 footer\n\
\x20   enable or disable display of the table footer [on, off]\n\
\x20 format\n\
\x20   set output format [unaligned, aligned, wrapped, html, asciidoc, ...]\n\
\x20 linestyle\n\
\x20   set the border line drawing style [ascii, old-ascii, unicode]\n\
\x20 null\n\
\x20   set the string to be printed in place of a null value\n\
\x20 numericlocale\n\
\x20   enable display of a locale-specific character to separate groups of digits\n\
\x20 pager\n\
\x20   control when an external pager is used [yes, no, always]\n\
\x20 recordsep\n\
\x20   record (line) separator for unaligned output\n\
\x20 recordsep_zero\n\
\x20   set record separator for unaligned output to a zero byte\n\
\x20 tableattr (or T)\n\
\x20   specify attributes for table tag in html format, or proportional\n\
\x20   column widths for left-aligned data types in latex-longtable format\n\
\x20 title\n\
\x20   set the table title for subsequently printed tables\n\
\x20 tuples_only\n\
\x20   if set, only actual table data is shown\n\
\x20 unicode_border_linestyle\n\
\x20 unicode_column_linestyle\n\
\x20 unicode_header_linestyle\n\
\x20   set the style of Unicode line drawing [single, double]\n\
\x20 xheader_width\n\
\x20   set the maximum width of the header for expanded output\n\
\x20   [full, column, page, integer value]\n\
\n\
Environment variables:\n\
Usage:\n\
\x20 NAME=VALUE [NAME=VALUE] postro-term ...\n\
\x20 or \\setenv NAME [VALUE] inside postro-term\n\
\n\
\x20 COLUMNS\n\
\x20   number of columns for wrapped format\n\
\x20 PGAPPNAME\n\
\x20   same as the application_name connection parameter\n\
\x20 PGDATABASE\n\
\x20   same as the dbname connection parameter\n\
\x20 PGHOST\n\
\x20   same as the host connection parameter\n\
\x20 PGPASSFILE\n\
\x20   password file name\n\
\x20 PGPASSWORD\n\
\x20   connection password (not recommended)\n\
\x20 PGPORT\n\
\x20   same as the port connection parameter\n\
\x20 PGUSER\n\
\x20   same as the user connection parameter\n\
\x20 PSQL_EDITOR, EDITOR, VISUAL\n\
\x20   editor used by the \\e, \\ef, and \\ev commands\n\
\x20 PSQL_EDITOR_LINENUMBER_ARG\n\
\x20   how to specify a line number when invoking the editor\n\
\x20 PSQL_HISTORY\n\
\x20   alternative location for the command history file\n\
\x20 PSQL_PAGER, PAGER\n\
\x20   name of external pager program\n\
\x20 PSQL_WATCH_PAGER\n\
\x20   name of external pager program used for \\watch\n\
\x20 PSQLRC\n\
\x20   alternative location for the user's .psqlrc file\n\
\x20 SHELL\n\
\x20   shell used by the \\! command\n\
\x20 TMPDIR\n\
\x20   directory for temporary files\n",
    )
}

/// `\?`, with `options`, `variables` or `commands`.
pub fn slash_usage(session: &mut Session, topic: Option<&str>) -> Result<()> {
    let text = match topic {
        Some("options") => usage_text(),
        Some("variables") => variables_text(),
        _ => {
            let dbname = session.conn.as_ref().map(|conn| conn.dbname().to_owned());
            commands_text(&session.popt, dbname.as_deref(), session.timing)
        }
    };
    pager::page(&text, &session.popt)?;
    Ok(())
}

fn doc_url(command: &str) -> String {
    let page = match command {
        "TABLE" | "WITH" => "select".to_owned(),
        "ROLLBACK TO SAVEPOINT" => "rollback-to".to_owned(),
        other => other.to_ascii_lowercase().replace(' ', ""),
    };
    format!("{DOCS_URL}/sql-{page}.html")
}

/// Commands named by the first words of `topic`, trying fewer words until something matches.
fn matching_commands(topic: &str) -> Vec<&'static str> {
    let words: Vec<&str> = topic.split_whitespace().collect();
    for n in (1..=words.len()).rev() {
        let prefix = words[..n].join(" ");
        let found: Vec<&str> = SQL_COMMANDS
            .iter()
            .copied()
            .filter(|cmd| {
                cmd.eq_ignore_ascii_case(&prefix)
                    || (cmd.len() > prefix.len()
                        && cmd.is_char_boundary(prefix.len())
                        && cmd[..prefix.len()].eq_ignore_ascii_case(&prefix)
                        && cmd.as_bytes()[prefix.len()] == b' ')
            })
            .collect();
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}

/// Known commands laid out in columns to fit `width`.
fn command_columns(width: usize) -> String {
    let cell = SQL_COMMANDS.iter().map(|cmd| cmd.len()).max().unwrap_or(0) + 2;
    let ncolumns = (width.saturating_sub(3) / cell).max(1);
    let nrows = SQL_COMMANDS.len().div_ceil(ncolumns);
    let mut text = String::from("Available help:\n");
    for row in 0..nrows {
        let mut line = String::from(" ");
        for col in 0..ncolumns {
            if let Some(cmd) = SQL_COMMANDS.get(row + col * nrows) {
                line.push_str(&format!(" {cmd:<width$}", width = cell - 1));
            }
        }
        text.push_str(line.trim_end());
        text.push('\n');
    }
    text
}

fn sql_help_text(topic: Option<&str>, width: usize) -> String {
    let topic = topic.map(str::trim).unwrap_or_default();
    if topic.is_empty() {
        return command_columns(width);
    }
    let commands = match topic {
        "*" => SQL_COMMANDS.to_vec(),
        topic => matching_commands(topic),
    };
    if commands.is_empty() {
        return format!("No help available for \"{topic}\".\nTry \\h with no arguments to see available help.\n");
    }
    commands
        .iter()
        .map(|cmd| format!("Command:     {cmd}\nURL: {}\n\n", doc_url(cmd)))
        .collect::<String>()
        .trim_end_matches('\n')
        .to_owned()
        + "\n"
}

/// `\h [topic]`.
pub fn sql_help(session: &mut Session, topic: Option<&str>) -> Result<()> {
    let width = match session.popt.output_columns(io::IsTerminal::is_terminal(&io::stdout())) {
        0 => 80,
        width => width,
    };
    pager::page(&sql_help_text(topic, width), &session.popt)?;
    Ok(())
}

pub fn print_copyright() {
    println!(
        "postro-term {VERSION}\n\
\n\
Permission to use, copy, modify, and distribute this software and its\n\
documentation for any purpose, without fee, and without a written agreement\n\
is hereby granted, provided that the above copyright notice and this\n\
paragraph appear in all copies.\n\
\n\
THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR\n\
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,\n\
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT."
    );
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sql_topics() {
        assert_eq!(matching_commands("select"), ["SELECT", "SELECT INTO"]);
        assert_eq!(matching_commands("create table"), ["CREATE TABLE", "CREATE TABLE AS"]);
        assert_eq!(matching_commands("alter table foo add column"), ["ALTER TABLE"]);
        assert!(matching_commands("frobnicate").is_empty());
        assert!(matching_commands("SEL").is_empty());
    }

    #[test]
    fn sql_help_output() {
        assert_eq!(
            sql_help_text(Some("vacuum"), 80),
            format!("Command:     VACUUM\nURL: {DOCS_URL}/sql-vacuum.html\n")
        );
        assert_eq!(
            sql_help_text(Some("nothing"), 80),
            "No help available for \"nothing\".\nTry \\h with no arguments to see available help.\n"
        );
        let listing = sql_help_text(None, 80);
        assert!(listing.starts_with("Available help:\n"));
        assert!(listing.contains("ABORT"));
        assert!(listing.contains("WITH"));
    }

    #[test]
    fn urls() {
        assert_eq!(doc_url("ALTER TABLE"), format!("{DOCS_URL}/sql-altertable.html"));
        assert_eq!(doc_url("WITH"), format!("{DOCS_URL}/sql-select.html"));
    }

    #[test]
    fn command_summary() {
        let text = commands_text(&PrintOptions::default(), None, false);
        assert!(text.contains("connect to new database (currently no connection)"));
        assert!(text.contains("toggle timing of commands (currently off)"));
        let text = commands_text(&PrintOptions::default(), Some("app"), true);
        assert!(text.contains("(currently \"app\")"));
    }
}
