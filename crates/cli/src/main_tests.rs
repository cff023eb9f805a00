// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn argv_of(args: &[&str]) -> (Vec<String>, bool) {
    let cli = Cli::try_parse_from(std::iter::once("wake").chain(args.iter().copied())).unwrap();
    wire_argv(&cli.command.unwrap())
}

#[test]
fn status_forwards_names_and_flag() {
    let (argv, quiet) = argv_of(&["status", "c2", "i1"]);
    assert_eq!(argv, vec!["status", "c2", "i1"]);
    assert!(!quiet);

    let (argv, quiet) = argv_of(&["status", "--machine-readable", "c2"]);
    assert_eq!(argv, vec!["status", "--machine-readable", "c2"]);
    assert!(quiet);
}

#[test]
fn start_and_restart_forward_the_optional_os() {
    assert_eq!(argv_of(&["start", "c2"]).0, vec!["start", "c2"]);
    assert_eq!(argv_of(&["start", "c2", "linux"]).0, vec!["start", "c2", "linux"]);
    assert_eq!(argv_of(&["restart", "c2", "win"]).0, vec!["restart", "c2", "win"]);
}

#[test]
fn command_keeps_hyphenated_arguments() {
    let (argv, _) = argv_of(&["command", "c2", "uname", "-a"]);
    assert_eq!(argv, vec!["command", "c2", "uname", "-a"]);
}

#[test]
fn daemon_actions_map_to_wire_verbs() {
    assert_eq!(argv_of(&["daemon", "stop"]).0, vec!["daemon", "stop"]);
    assert_eq!(argv_of(&["daemon", "restart"]).0, vec!["daemon", "restart"]);
}

#[test]
fn command_without_argv_is_a_usage_error() {
    assert!(Cli::try_parse_from(["wake", "command", "c2"]).is_err());
}

#[test]
fn missing_machine_is_a_usage_error() {
    assert!(Cli::try_parse_from(["wake", "start"]).is_err());
    assert!(Cli::try_parse_from(["wake", "kill"]).is_err());
}
