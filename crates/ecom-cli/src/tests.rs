use super::*;

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["ecom-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli = Cli::try_parse_from(["ecom-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn parses_sessions_purge_command() {
    let cli =
        Cli::try_parse_from(["ecom-cli", "sessions", "purge"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Sessions {
            command: SessionCommands::Purge
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["ecom-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn unknown_subcommand_is_rejected() {
    assert!(Cli::try_parse_from(["ecom-cli", "db", "seed"]).is_err());
    assert!(Cli::try_parse_from(["ecom-cli", "sessions"]).is_err());
}
