// ABOUTME: Integration tests for configuration parsing, discovery and overrides.
// ABOUTME: Tests YAML parsing, env-backed credentials, and IMAGEKEEPER_* overrides.

use imagekeeper::config::*;
use imagekeeper::coordinator::DEFAULT_REMOVE_DELAY;
use imagekeeper::error::Error;
use imagekeeper::store::RuntimeType;
use std::time::Duration;

mod parsing {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert!(config.cleanup);
        assert_eq!(config.remove_delay, DEFAULT_REMOVE_DELAY);
        assert!(config.auth.is_none());
        assert!(config.runtime.is_none());
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
cleanup: false
remove_delay: 90s

auth:
  username: robot
  password:
    env: REGISTRY_PASSWORD
  server: registry.example.com

runtime:
  runtime: podman
  socket: /run/podman/podman.sock

logging:
  filter: imagekeeper=debug
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert!(!config.cleanup);
        assert_eq!(config.remove_delay, Duration::from_secs(90));

        let auth = config.auth.as_ref().unwrap();
        assert_eq!(auth.username, EnvValue::Literal("robot".to_string()));
        assert_eq!(
            auth.password,
            EnvValue::FromEnv {
                var: "REGISTRY_PASSWORD".to_string(),
                default: None,
            }
        );
        assert_eq!(auth.server.as_deref(), Some("registry.example.com"));

        let runtime = config.runtime.as_ref().unwrap();
        assert_eq!(runtime.runtime, Some(RuntimeType::Podman));
        assert_eq!(runtime.socket.as_deref(), Some("/run/podman/podman.sock"));
        assert_eq!(config.logging.filter, "imagekeeper=debug");
    }

    #[test]
    fn compound_delay_is_parsed() {
        let config = Config::from_yaml("remove_delay: 1m 30s").unwrap();
        assert_eq!(config.remove_delay, Duration::from_secs(90));
    }

    #[test]
    fn invalid_delay_returns_error() {
        let err = Config::from_yaml("remove_delay: whenever").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }

    #[test]
    fn unknown_runtime_returns_error() {
        assert!(Config::from_yaml("runtime:\n  runtime: containerd\n").is_err());
    }
}

mod credentials {
    use super::*;

    const YAML: &str = r#"
auth:
  username: robot
  password:
    env: IMAGEKEEPER_TEST_PASSWORD
"#;

    #[test]
    fn env_backed_password_is_resolved() {
        let config = Config::from_yaml(YAML).unwrap();
        temp_env::with_var("IMAGEKEEPER_TEST_PASSWORD", Some("s3cret"), || {
            let settings = config.settings().unwrap();
            let auth = settings.auth.unwrap();
            assert_eq!(auth.username, "robot");
            assert_eq!(auth.password, "s3cret");
            assert!(auth.server.is_none());
        });
    }

    #[test]
    fn missing_password_variable_returns_error() {
        let config = Config::from_yaml(YAML).unwrap();
        temp_env::with_var_unset("IMAGEKEEPER_TEST_PASSWORD", || {
            let err = config.settings().unwrap_err();
            assert!(matches!(err, Error::MissingEnvVar(var) if var == "IMAGEKEEPER_TEST_PASSWORD"));
        });
    }

    #[test]
    fn env_default_applies_when_variable_unset() {
        let value = EnvValue::FromEnv {
            var: "IMAGEKEEPER_TEST_UNSET".to_string(),
            default: Some("fallback".to_string()),
        };
        temp_env::with_var_unset("IMAGEKEEPER_TEST_UNSET", || {
            assert_eq!(value.resolve().unwrap(), "fallback");
        });
    }

    #[test]
    fn no_auth_section_means_no_default_credentials() {
        let settings = Config::default().settings().unwrap();
        assert!(settings.auth.is_none());
        assert!(settings.cleanup);
        assert_eq!(settings.remove_delay, DEFAULT_REMOVE_DELAY);
    }
}

mod overrides {
    use super::*;

    #[test]
    fn env_overrides_file_values() {
        let config = Config::from_yaml("cleanup: true\nremove_delay: 3m\n").unwrap();
        temp_env::with_vars(
            [(ENV_CLEANUP, Some("false")), (ENV_REMOVE_DELAY, Some("10s"))],
            || {
                let config = config.clone().apply_env().unwrap();
                assert!(!config.cleanup);
                assert_eq!(config.remove_delay, Duration::from_secs(10));
            },
        );
    }

    #[test]
    fn unset_overrides_leave_file_values() {
        let config = Config::from_yaml("cleanup: false\nremove_delay: 5m\n").unwrap();
        temp_env::with_vars_unset([ENV_CLEANUP, ENV_REMOVE_DELAY], || {
            let config = config.clone().apply_env().unwrap();
            assert!(!config.cleanup);
            assert_eq!(config.remove_delay, Duration::from_secs(300));
        });
    }

    #[test]
    fn malformed_override_returns_error() {
        temp_env::with_var(ENV_CLEANUP, Some("sometimes"), || {
            let err = Config::default().apply_env().unwrap_err();
            assert!(matches!(err, Error::InvalidConfig(_)));
        });
    }
}

mod discovery {
    use super::*;
    use std::fs;

    #[test]
    fn discovers_primary_filename() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "remove_delay: 45s\n").unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.remove_delay, Duration::from_secs(45));
    }

    #[test]
    fn discovers_nested_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".imagekeeper")).unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_DIR), "cleanup: false\n").unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert!(!config.cleanup);
    }

    #[test]
    fn primary_filename_wins_over_alternative() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "remove_delay: 1s\n").unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_ALT), "remove_delay: 2s\n").unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.remove_delay, Duration::from_secs(1));
    }

    #[test]
    fn missing_config_returns_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::discover(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound(path) if path == dir.path()));
    }

    #[test]
    fn load_reports_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("absent.yml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}

mod logging {
    use super::*;

    #[test]
    fn second_init_keeps_existing_subscriber() {
        let config = Config::from_yaml("logging:\n  filter: imagekeeper=trace\n").unwrap();
        imagekeeper::logging::init(&config.logging);
        assert!(!imagekeeper::logging::init(&config.logging));
    }
}
