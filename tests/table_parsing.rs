use std::error::Error;
use std::fs;

use tempfile::tempdir;

use watchcron::errors::ParseError;
use watchcron::table::{load_user_tables, mask, Rule, Table};

type TestResult = Result<(), Box<dyn Error>>;

fn parse(line: &str) -> Result<Option<Rule>, ParseError> {
    Rule::parse_line(line, 1)
}

fn parse_ok(line: &str) -> Rule {
    parse(line)
        .expect("line should parse")
        .expect("line should produce a rule")
}

#[test]
fn basic_line_parses_with_defaults() {
    let rule = parse_ok("/tmp IN_CREATE echo test");

    assert_eq!(rule.path, "/tmp");
    assert_eq!(rule.mask, mask::lookup("IN_CREATE").unwrap());
    assert_eq!(rule.command, "echo test");
    assert!(rule.no_self_trigger);
    assert!(rule.recursive);
    assert!(!rule.include_dot_dirs);
    assert_eq!(rule.line, 1);
}

#[test]
fn comma_separated_events_are_ored() {
    let rule = parse_ok("/tmp IN_CREATE,IN_MODIFY echo test");
    let expected = mask::lookup("IN_CREATE").unwrap() | mask::lookup("IN_MODIFY").unwrap();
    assert_eq!(rule.mask, expected);
}

#[test]
fn options_toggle_behaviour_flags() {
    let rule = parse_ok("/tmp IN_CREATE,loopable=true,recursive=false echo test");
    assert!(!rule.no_self_trigger);
    assert!(!rule.recursive);
    assert_eq!(rule.mask, mask::lookup("IN_CREATE").unwrap());

    let rule = parse_ok("/tmp IN_CREATE,dotdirs=true echo test");
    assert!(rule.include_dot_dirs);
}

#[test]
fn aliases_expand_to_their_members() {
    let rule = parse_ok("/tmp IN_MOVE echo test");
    let expected = mask::lookup("IN_MOVED_FROM").unwrap() | mask::lookup("IN_MOVED_TO").unwrap();
    assert_eq!(rule.mask, expected);
    // The alias never survives rendering; its members do.
    assert!(rule.render().contains("IN_MOVED_FROM,IN_MOVED_TO"));
}

#[test]
fn numeric_masks_parse_in_decimal_and_hex() {
    let create = mask::lookup("IN_CREATE").unwrap();
    assert_eq!(parse_ok(&format!("/tmp {create} echo test")).mask, create);
    assert_eq!(parse_ok(&format!("/tmp 0x{create:x} echo test")).mask, create);
}

#[test]
fn comments_and_blank_lines_are_skipped() -> TestResult {
    assert!(parse("")?.is_none());
    assert!(parse("   ")?.is_none());
    assert!(parse("# /tmp IN_CREATE echo test")?.is_none());
    assert!(parse("   # indented comment")?.is_none());
    Ok(())
}

#[test]
fn too_few_fields_is_an_error() {
    assert_eq!(
        parse("/tmp IN_CREATE"),
        Err(ParseError::BadFieldCount { line: 1 })
    );
    assert_eq!(parse("/tmp"), Err(ParseError::BadFieldCount { line: 1 }));
}

#[test]
fn relative_path_is_a_validation_error() {
    assert_eq!(
        parse("tmp IN_CREATE echo test"),
        Err(ParseError::RelativePath {
            line: 1,
            path: "tmp".to_string()
        })
    );
}

#[test]
fn unknown_tokens_are_errors() {
    assert_eq!(
        parse("/tmp IN_BOGUS echo test"),
        Err(ParseError::UnknownMask {
            line: 1,
            token: "IN_BOGUS".to_string()
        })
    );
    assert_eq!(
        parse("/tmp IN_CREATE,frobnicate=true echo test"),
        Err(ParseError::UnknownOption {
            line: 1,
            key: "frobnicate".to_string()
        })
    );
    assert_eq!(
        parse("/tmp IN_CREATE,recursive=maybe echo test"),
        Err(ParseError::BadOptionValue {
            line: 1,
            key: "recursive".to_string(),
            value: "maybe".to_string()
        })
    );
}

#[test]
fn options_alone_leave_the_mask_empty() {
    assert_eq!(
        parse("/tmp recursive=false echo test"),
        Err(ParseError::EmptyMask { line: 1 })
    );
}

#[test]
fn render_then_parse_round_trips() -> TestResult {
    let lines = [
        "/tmp IN_CREATE echo test",
        "/tmp IN_CREATE,IN_MODIFY,loopable=true echo test",
        "/var/log IN_CLOSE_WRITE,recursive=false,dotdirs=true /usr/bin/index $@/$#",
        "/tmp IN_ALL_EVENTS echo all",
        "/tmp IN_CREATE,0x10000 echo residual",
    ];

    for line in lines {
        let rule = parse_ok(line);
        let reparsed = parse_ok(&rule.render());
        assert_eq!(rule, reparsed, "round trip failed for {line:?}");
        // Idempotence: rendering the reparsed rule changes nothing more.
        assert_eq!(rule.render(), reparsed.render());
    }
    Ok(())
}

#[test]
fn all_events_mask_renders_as_single_token() {
    let rule = parse_ok("/tmp IN_ALL_EVENTS echo test");
    assert_eq!(rule.render(), "/tmp IN_ALL_EVENTS echo test");
}

#[test]
fn residual_bits_render_as_hex() {
    let rule = parse_ok("/tmp IN_CREATE,0x10000 echo test");
    assert_eq!(rule.render(), "/tmp IN_CREATE,0x10000 echo test");
}

#[test]
fn glob_paths_match_like_anchored_dot_star() {
    let rule = parse_ok("/data/*.txt IN_CREATE echo test");
    assert!(rule.matches_path("/data/a.txt"));
    assert!(rule.matches_path("/data/sub/b.txt"));
    assert!(!rule.matches_path("/data/a.txt.bak"));

    let literal = parse_ok("/data IN_CREATE echo test");
    assert!(literal.matches_path("/data"));
    assert!(!literal.matches_path("/data/a.txt"));
}

#[test]
fn table_load_reports_bad_lines_with_location() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("alice");
    fs::write(&path, "# header\n/tmp IN_CREATE echo ok\n/tmp NOPE echo bad\n")?;

    let err = Table::load(&path, "alice").unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("line 3"), "missing line number in: {msg}");
    Ok(())
}

#[test]
fn directory_load_skips_broken_tables() -> TestResult {
    let dir = tempdir()?;
    fs::write(dir.path().join("alice"), "/tmp IN_CREATE echo hi\n")?;
    fs::write(dir.path().join("bob"), "not a rule line\n")?;

    let tables = load_user_tables(dir.path());
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].principal, "alice");
    assert_eq!(tables[0].len(), 1);
    Ok(())
}

#[test]
fn table_render_includes_every_rule() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("alice");
    fs::write(&path, "/tmp IN_CREATE echo one\n/var IN_MODIFY echo two\n")?;

    let table = Table::load(&path, "alice")?;
    let rendered = table.render();
    assert!(rendered.contains("/tmp IN_CREATE echo one"));
    assert!(rendered.contains("/var IN_MODIFY echo two"));

    // The rendered table is itself loadable.
    let rerendered = dir.path().join("alice2");
    fs::write(&rerendered, rendered)?;
    let reloaded = Table::load(&rerendered, "alice")?;
    assert_eq!(reloaded.len(), table.len());
    Ok(())
}
