use super::subcommands::parse_start_at;
use super::*;
use clap::CommandFactory;

#[test]
fn test_cli_definition_is_valid() {
    Cli::command().debug_assert();
}

#[test]
fn test_run_args_build_start_request() {
    let cli = Cli::try_parse_from([
        "maturation",
        "run",
        "--sessions",
        "waha-main:alpha,beta",
        "-s",
        "evo-1:gamma",
        "--rounds",
        "2",
        "--minutes",
        "10",
        "--pause",
        "5",
        "-t",
        "Oi!",
        "--id",
        "cli-run",
    ])
    .unwrap();
    let Commands::Run(args) = cli.command else {
        panic!("expected run");
    };
    let req = args.start_request();
    assert_eq!(req.sessions, vec!["waha-main:alpha", "beta", "evo-1:gamma"]);
    assert_eq!(req.number_of_rounds, 2);
    assert_eq!(req.minutes_per_round, 10);
    assert_eq!(req.pause_minutes_between_rounds, 5);
    assert_eq!(req.message_templates, vec!["Oi!"]);
    assert_eq!(req.maturation_id.as_deref(), Some("cli-run"));
    assert!(req.validate().is_ok());
}

#[test]
fn test_run_defaults() {
    let cli = Cli::try_parse_from(["maturation", "run"]).unwrap();
    let Commands::Run(args) = cli.command else {
        panic!("expected run");
    };
    let settings = args.settings();
    assert_eq!(settings.number_of_rounds, 1);
    assert_eq!(settings.minutes_per_round, 30);
    assert!(args.sessions().is_empty());
}

#[test]
fn test_global_config_flag() {
    let cli = Cli::try_parse_from(["maturation", "endpoints", "--config", "/tmp/c.json"]).unwrap();
    assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.json")));
}

#[test]
fn test_schedule_add_parses() {
    let cli = Cli::try_parse_from([
        "maturation",
        "schedule",
        "add",
        "--name",
        "night",
        "--at",
        "2026-01-02T03:04:05Z",
        "--rounds",
        "3",
    ])
    .unwrap();
    let Commands::Schedule {
        cmd: ScheduleCommands::Add { name, at, run },
    } = cli.command
    else {
        panic!("expected schedule add");
    };
    assert_eq!(name, "night");
    assert_eq!(run.rounds, 3);
    assert_eq!(parse_start_at(&at).unwrap(), 1_767_323_045_000);
}

#[test]
fn test_parse_start_at_formats() {
    assert_eq!(
        parse_start_at("2026-01-02T03:04:05+00:00").unwrap(),
        1_767_323_045_000
    );
    assert!(parse_start_at("2026-01-02 03:04:05").is_ok());
    assert!(parse_start_at("tomorrow").is_err());
}
