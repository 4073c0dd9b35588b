use std::{env, env::VarError};

/// The server takes no arguments. Any argument prints the help text and the current configuration, then returns true.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Bot tokens, TronGrid keys and the API token are deliberately absent
    const DISPLAY_ENVS: [&str; 17] = [
        "RUST_LOG",
        "UPG_HOST",
        "UPG_PORT",
        "UPG_DATABASE_URL",
        "UPG_MEMBERSHIP_DATABASE_URL",
        "UPG_MEMBERSHIP_UTC_OFFSET",
        "UPG_WALLET_ADDRESS",
        "UPG_USDT_CONTRACT",
        "UPG_TRONGRID_URL",
        "UPG_TELEGRAM_API_URL",
        "UPG_TELEGRAM_NOTIFY_CHAT_ID",
        "UPG_ORDER_TIMEOUT",
        "UPG_MIN_CONFIRMATIONS",
        "UPG_POLL_INTERVAL",
        "UPG_TX_MAX_AGE",
        "UPG_BATCH_SIZE",
        "UPG_RETRY_UNFULFILLED",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
