use crate::{
    cli::actions::{server::Args, Action},
    tokens::SigningAlgorithm,
};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let max_connections = matches
        .get_one::<u32>("max-connections")
        .copied()
        .unwrap_or(5);

    let secret_key = matches
        .get_one::<String>("secret-key")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --secret-key")?;
    let algorithm = matches
        .get_one::<SigningAlgorithm>("algorithm")
        .copied()
        .unwrap_or(SigningAlgorithm::HS256);
    let access_minutes = matches
        .get_one::<u64>("access-minutes")
        .copied()
        .unwrap_or(30);
    let refresh_days = matches.get_one::<u64>("refresh-days").copied().unwrap_or(7);

    let password_salt = matches
        .get_one::<String>("password-salt")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --password-salt")?;
    let hash_memory_kib = matches
        .get_one::<u32>("hash-memory-kib")
        .copied()
        .unwrap_or(argon2::Params::DEFAULT_M_COST);
    let hash_iterations = matches
        .get_one::<u32>("hash-iterations")
        .copied()
        .unwrap_or(argon2::Params::DEFAULT_T_COST);
    let hash_parallelism = matches
        .get_one::<u32>("hash-parallelism")
        .copied()
        .unwrap_or(argon2::Params::DEFAULT_P_COST);

    Ok(Action::Server(Args {
        port,
        dsn,
        max_connections,
        secret_key,
        algorithm,
        access_minutes,
        refresh_days,
        password_salt,
        hash_memory_kib,
        hash_iterations,
        hash_parallelism,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    #[test]
    fn builds_server_action() {
        let matches = commands::new().get_matches_from(vec![
            "passgate",
            "--dsn",
            "memory://",
            "--secret-key",
            "s3cr3t",
            "--password-salt",
            "pepper",
            "--hash-memory-kib",
            "64",
            "--hash-iterations",
            "1",
        ]);

        let Action::Server(args) = handler(&matches).unwrap();
        assert_eq!(args.dsn, "memory://");
        assert_eq!(args.secret_key.expose_secret(), "s3cr3t");
        assert_eq!(args.password_salt.expose_secret(), "pepper");
        assert_eq!(args.hash_memory_kib, 64);
        assert_eq!(args.hash_iterations, 1);

        let debug = format!("{args:?}");
        assert!(!debug.contains("s3cr3t"));
        assert!(!debug.contains("pepper"));
    }
}
