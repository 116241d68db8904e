use crate::tokens::SigningAlgorithm;
use clap::{Arg, Command};

pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    with_password_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("secret-key")
                .long("secret-key")
                .help("Secret key used to sign access and refresh tokens")
                .env("PASSGATE_SECRET_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("algorithm")
                .long("algorithm")
                .help("Token signing algorithm: HS256, HS384 or HS512")
                .env("PASSGATE_JWT_ALGORITHM")
                .default_value("HS256")
                .value_parser(|value: &str| value.parse::<SigningAlgorithm>()),
        )
        .arg(
            Arg::new("access-minutes")
                .long("access-minutes")
                .help("Access token lifetime in minutes")
                .env("PASSGATE_ACCESS_MINUTES")
                .default_value("30")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("refresh-days")
                .long("refresh-days")
                .help("Refresh token lifetime in days")
                .env("PASSGATE_REFRESH_DAYS")
                .default_value("7")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

fn with_password_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("password-salt")
                .long("password-salt")
                .help("Server-wide salt mixed into every password digest")
                .long_help(
                    "Server-wide salt mixed into every password digest. \
                     Changing it invalidates every stored password.",
                )
                .env("PASSGATE_PASSWORD_SALT")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("hash-memory-kib")
                .long("hash-memory-kib")
                .help("Argon2id memory cost in KiB")
                .env("PASSGATE_HASH_MEMORY_KIB")
                .default_value("19456")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("hash-iterations")
                .long("hash-iterations")
                .help("Argon2id iteration count")
                .env("PASSGATE_HASH_ITERATIONS")
                .default_value("2")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("hash-parallelism")
                .long("hash-parallelism")
                .help("Argon2id degree of parallelism")
                .env("PASSGATE_HASH_PARALLELISM")
                .default_value("1")
                .value_parser(clap::value_parser!(u32)),
        )
}
