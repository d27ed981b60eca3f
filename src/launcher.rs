//! Starting applications and recording launch history.

use crate::db::Database;
use crate::error::LaunchError;
use crate::types::{AppSource, ApplicationRecord};
use std::process::{Command, Stdio};
use std::sync::Arc;

/// Performs the OS-level launch of an application.
pub trait AppLauncher: Send + Sync {
    /// Starts `app` without waiting for it to exit.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError::Spawn` if the process cannot be started.
    fn launch(&self, app: &ApplicationRecord) -> Result<(), LaunchError>;
}

/// Spawns applications as detached child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandLauncher;

impl CommandLauncher {
    fn command_for(app: &ApplicationRecord) -> Command {
        // Packaged apps are addressed by their app-user-model ID
        if app.source == AppSource::Packaged && cfg!(windows) {
            let mut cmd = Command::new("explorer.exe");
            cmd.arg(format!("shell:AppsFolder\\{}", app.executable));
            return cmd;
        }

        let mut cmd = Command::new(&app.executable);
        if let Some(args) = app.arguments.as_deref() {
            cmd.args(split_arguments(args));
        }
        if let Some(dir) = app.working_directory.as_deref().filter(|d| !d.trim().is_empty()) {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl AppLauncher for CommandLauncher {
    fn launch(&self, app: &ApplicationRecord) -> Result<(), LaunchError> {
        Self::command_for(app)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(drop)
            .map_err(|source| LaunchError::Spawn {
                executable: app.executable.clone(),
                source,
            })
    }
}

/// Splits a stored argument string, honouring double quotes.
fn split_arguments(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut pending = false;

    for c in raw.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                pending = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if pending {
                    args.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if pending {
        args.push(current);
    }
    args
}

/// Launches applications and remembers what was launched.
///
/// A failed history write is logged and otherwise ignored: the
/// application is already running by then.
pub struct LaunchService {
    db: Arc<Database>,
    launcher: Arc<dyn AppLauncher>,
}

impl LaunchService {
    pub fn new(db: Arc<Database>, launcher: Arc<dyn AppLauncher>) -> Self {
        Self { db, launcher }
    }

    /// Launches `app` and records the launch with the query that found it.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError::Spawn` if the launcher fails; nothing is
    /// recorded in that case.
    pub fn launch(&self, app: &ApplicationRecord, query: Option<&str>) -> Result<(), LaunchError> {
        self.launcher.launch(app)?;
        tracing::info!("Launched '{}' ({})", app.name, app.executable);

        match app.id {
            Some(id) => {
                if let Err(e) = self.db.record_launch(id, query) {
                    tracing::warn!("Failed to record launch of {id}: {e}");
                }
            }
            None => tracing::debug!("'{}' is not indexed; launch not recorded", app.name),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::AppRepository;
    use crate::types::IndexedEntry;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLauncher {
        launched: Mutex<Vec<String>>,
        fail: bool,
    }

    impl AppLauncher for RecordingLauncher {
        fn launch(&self, app: &ApplicationRecord) -> Result<(), LaunchError> {
            if self.fail {
                return Err(LaunchError::Spawn {
                    executable: app.executable.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
                });
            }
            self.launched.lock().unwrap().push(app.name.clone());
            Ok(())
        }
    }

    fn stored_app(db: &Database) -> ApplicationRecord {
        db.upsert_batch(&[IndexedEntry::new(
            ApplicationRecord::new("Terminal", "/usr/bin/term", AppSource::Shortcut),
            ["terminal".to_string()].into(),
        )])
        .unwrap();
        db.get_all().unwrap()[0].clone()
    }

    #[test]
    fn test_split_arguments() {
        assert_eq!(split_arguments("--new-window"), vec!["--new-window"]);
        assert_eq!(
            split_arguments(r#"-p "My Profile"  --flag"#),
            vec!["-p", "My Profile", "--flag"]
        );
        assert_eq!(split_arguments(r#""""#), vec![""]);
        assert!(split_arguments("   ").is_empty());
    }

    #[test]
    fn test_launch_records_history() {
        let db = Arc::new(Database::in_memory().unwrap());
        let app = stored_app(&db);
        let launcher = Arc::new(RecordingLauncher::default());
        let service = LaunchService::new(Arc::clone(&db), Arc::clone(&launcher) as Arc<dyn AppLauncher>);

        service.launch(&app, Some("term")).unwrap();

        assert_eq!(*launcher.launched.lock().unwrap(), vec!["Terminal".to_string()]);
        let recent = db.recent_launches(5).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].query.as_deref(), Some("term"));
    }

    #[test]
    fn test_failed_launch_is_not_recorded() {
        let db = Arc::new(Database::in_memory().unwrap());
        let app = stored_app(&db);
        let launcher = Arc::new(RecordingLauncher {
            fail: true,
            ..RecordingLauncher::default()
        });
        let service = LaunchService::new(Arc::clone(&db), launcher);

        assert!(matches!(service.launch(&app, None), Err(LaunchError::Spawn { .. })));
        assert!(db.recent_launches(5).unwrap().is_empty());
    }

    #[test]
    fn test_history_failure_is_not_fatal() {
        let db = Arc::new(Database::in_memory().unwrap());
        let mut app = ApplicationRecord::new("Ghost", "/ghost", AppSource::Shortcut);
        app.id = Some(crate::types::AppId::new(404));
        let service = LaunchService::new(db, Arc::new(RecordingLauncher::default()));

        service.launch(&app, None).unwrap();
    }

    #[test]
    fn test_command_launcher_reports_missing_executable() {
        let app = ApplicationRecord::new("Nope", "/definitely/not/here/app-xyz", AppSource::Filesystem);
        let err = CommandLauncher.launch(&app).unwrap_err();
        assert_eq!(err.code(), "LAUNCH_FAILED");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_launcher_spawns() {
        let app = ApplicationRecord::new("Shell", "sh", AppSource::Filesystem)
            .with_arguments("-c true")
            .with_working_directory("/");
        CommandLauncher.launch(&app).unwrap();
    }
}
