use super::*;

#[test]
fn test_cli_parse_coordinator() {
    let args = Cli::from_args(&["jobrelay"], &["coordinator", "--config", "c.properties"]).unwrap();
    match args.command {
        Commands::Coordinator(CoordinatorArgs {
            config,
            rotation,
            forward_timeout_ms,
        }) => {
            assert_eq!(config, PathBuf::from("c.properties"));
            assert!(rotation.is_none());
            assert!(forward_timeout_ms.is_none());
        }
        _ => panic!("Expected Coordinator command"),
    }
}

#[test]
fn test_cli_parse_coordinator_policy_knobs() {
    let args = Cli::from_args(
        &["jobrelay"],
        &[
            "coordinator",
            "-c",
            "c.properties",
            "--rotation",
            "append",
            "--forward-timeout-ms",
            "2500",
        ],
    )
    .unwrap();
    match args.command {
        Commands::Coordinator(CoordinatorArgs {
            rotation,
            forward_timeout_ms,
            ..
        }) => {
            assert_eq!(rotation, Some(RotationPolicy::Append));
            assert_eq!(forward_timeout_ms, Some(2500));
        }
        _ => panic!("Expected Coordinator command"),
    }
}

#[test]
fn test_cli_rejects_unknown_rotation() {
    let result = Cli::from_args(
        &["jobrelay"],
        &["coordinator", "-c", "c.properties", "--rotation", "random"],
    );
    assert!(result.is_err());
}

#[test]
fn test_cli_parse_worker() {
    let args = Cli::from_args(
        &["jobrelay"],
        &[
            "worker",
            "--worker-config",
            "w.properties",
            "--coordinator-config",
            "c.properties",
            "--scripts",
            "tools",
            "--register-attempts",
            "3",
        ],
    )
    .unwrap();
    match args.command {
        Commands::Worker(WorkerArgs {
            worker_config,
            coordinator_config,
            code_source_config,
            scripts,
            register_attempts,
        }) => {
            assert_eq!(worker_config, PathBuf::from("w.properties"));
            assert_eq!(coordinator_config, PathBuf::from("c.properties"));
            assert!(code_source_config.is_none());
            assert_eq!(scripts, Some(PathBuf::from("tools")));
            assert_eq!(register_attempts, Some(3));
        }
        _ => panic!("Expected Worker command"),
    }
}

#[test]
fn test_cli_worker_requires_coordinator_config() {
    let result = Cli::from_args(&["jobrelay"], &["worker", "--worker-config", "w.properties"]);
    assert!(result.is_err());
}

#[test]
fn test_cli_parse_submit() {
    let args = Cli::from_args(
        &["jobrelay"],
        &["submit", "-c", "c.properties", "Fibonacci", "10", "--timeout-ms", "100"],
    )
    .unwrap();
    match args.command {
        Commands::Submit(SubmitArgs {
            config,
            tool,
            parameter,
            timeout_ms,
        }) => {
            assert_eq!(config, PathBuf::from("c.properties"));
            assert_eq!(tool, "Fibonacci");
            assert_eq!(parameter, "10");
            assert_eq!(timeout_ms, Some(100));
        }
        _ => panic!("Expected Submit command"),
    }
}

#[test]
fn test_cli_submit_parameter_defaults_to_null() {
    let args = Cli::from_args(&["jobrelay"], &["submit", "-c", "c.properties", "Echo"]).unwrap();
    match args.command {
        Commands::Submit(SubmitArgs { parameter, .. }) => assert_eq!(parameter, "null"),
        _ => panic!("Expected Submit command"),
    }
}
