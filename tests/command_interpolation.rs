use std::error::Error;

use watchcron::table::{mask, Rule};

type TestResult = Result<(), Box<dyn Error>>;

fn rule_with_command(command: &str) -> Rule {
    Rule::parse_line(&format!("/w IN_CREATE {command}"), 1)
        .expect("line should parse")
        .expect("line should produce a rule")
}

#[test]
fn all_placeholders_expand() -> TestResult {
    let create = mask::lookup("IN_CREATE").unwrap();
    let rule = rule_with_command("echo $@ $# $% $& $$");

    let expanded = rule.interpolate("/w", "f.txt", create);
    let argv: Vec<&str> = expanded.split_whitespace().collect();

    assert_eq!(
        argv,
        vec![
            "echo",
            "/w",
            "f.txt",
            "IN_CREATE",
            &create.to_string()[..],
            "$",
        ]
    );
    Ok(())
}

#[test]
fn dollar_dollar_is_single_pass() {
    // The `$` produced by `$$` must not consume the following `@`.
    let rule = rule_with_command("x$$@y");
    assert_eq!(rule.interpolate("/w", "f", 0), "x$@y");

    let rule = rule_with_command("$$#");
    assert_eq!(rule.interpolate("/w", "name", 0), "$#");
}

#[test]
fn unknown_and_trailing_dollars_pass_through() {
    let rule = rule_with_command("a$zb");
    assert_eq!(rule.interpolate("/w", "f", 0), "a$zb");

    let rule = rule_with_command("tail$");
    assert_eq!(rule.interpolate("/w", "f", 0), "tail$");
}

#[test]
fn event_names_expansion_joins_set_bits() {
    let create = mask::lookup("IN_CREATE").unwrap();
    let isdir = mask::lookup("IN_ISDIR").unwrap();
    let rule = rule_with_command("log $%");

    let expanded = rule.interpolate("/w", "d", create | isdir);
    assert_eq!(expanded, "log IN_CREATE,IN_ISDIR");
}

#[test]
fn unnamed_mask_renders_as_hex() {
    let rule = rule_with_command("log $%");
    assert_eq!(rule.interpolate("/w", "", 0x10000), "log 0x10000");
}

#[test]
fn empty_name_expands_to_nothing() {
    let rule = rule_with_command("touch /out/$#");
    assert_eq!(rule.interpolate("/w", "", 0), "touch /out/");
}
