//! The application core: every command the front end can invoke, wired to
//! the property store, the data root, the notifier and the platform gate.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::account::{AccountClient, OfflineAccountClient};
use crate::command::{Command, Reply};
use crate::config::Config;
use crate::dispatch::CommandHandler;
use crate::gate::{Authenticator, ConfirmationGate, UnavailableAuthenticator};
use crate::notifier::{CoreEvent, EventNotifier};
use crate::paths::Paths;
use crate::properties::{PropertyStore, keys};
use crate::storage::{EXTEND_DIRS_DELIMITER, MigrationEngine, MigrationOutcome, MigrationProgress};

pub struct AppCore {
    config: Config,
    properties: PropertyStore,
    storage: MigrationEngine,
    notifier: Arc<EventNotifier>,
    gate: ConfirmationGate,
    accounts: Arc<dyn AccountClient>,
    /// Only one migration may touch the data roots at a time.
    migration: Mutex<()>,
}

impl AppCore {
    /// Load config and properties for the files directory `files_dir`.
    ///
    /// Starts with no platform prompt and the offline account client; use
    /// [`AppCore::with_authenticator`] and [`AppCore::with_account_client`]
    /// to wire in real ones.
    pub fn open(files_dir: &str) -> Result<Self> {
        let config = Config::load_from_dir(files_dir)?;
        let storage = MigrationEngine::new(config.paths.clone(), &config.storage);

        let root = storage.current_root();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create data root {}", root.display()))?;
        let properties = PropertyStore::open(Paths::properties_file(&root));
        info!(
            "Core ready: data root {} ({} properties)",
            root.display(),
            properties.len()
        );

        let gate = ConfirmationGate::new(
            Arc::new(UnavailableAuthenticator),
            config.bridge.confirmation_timeout(),
        );

        Ok(Self {
            config,
            properties,
            storage,
            notifier: Arc::new(EventNotifier::new()),
            gate,
            accounts: Arc::new(OfflineAccountClient),
            migration: Mutex::new(()),
        })
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.gate = ConfirmationGate::new(authenticator, self.config.bridge.confirmation_timeout());
        self
    }

    /// Add candidate data roots known only to the host, such as the
    /// external volumes Android reports at runtime.
    pub fn with_extend_dirs(mut self, dirs: Vec<String>) -> Self {
        for dir in dirs {
            if !dir.is_empty() && !self.config.storage.extend_dirs.contains(&dir) {
                self.config.storage.extend_dirs.push(dir);
            }
        }
        self.storage = MigrationEngine::new(self.config.paths.clone(), &self.config.storage);
        self
    }

    pub fn with_account_client(mut self, accounts: Arc<dyn AccountClient>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    pub fn storage(&self) -> &MigrationEngine {
        &self.storage
    }

    pub fn notifier(&self) -> &Arc<EventNotifier> {
        &self.notifier
    }

    pub fn execute(&self, command: Command) -> Result<Reply> {
        debug!("Executing {}", command.method());

        let reply = match command {
            Command::LoadProperty(p) => Reply::value(self.properties.get(&p.name, &p.default_value)),
            Command::SaveProperty(p) => Reply::success(self.save(&p.name, &p.value)),
            Command::GetProperty(key) => {
                Reply::value(self.properties.get(key.key(), key.default_value()))
            }
            Command::SetProperty(key, value) => Reply::success(self.save(key.key(), &value)),

            Command::PreLogin => {
                let (username, password) = self.credentials();
                Reply::value(!username.is_empty() && !password.is_empty())
            }
            Command::Login => {
                let (username, password) = self.credentials();
                if username.is_empty() || password.is_empty() {
                    debug!("Login skipped: no stored credentials");
                    Reply::success(false)
                } else {
                    Reply::success(self.accounts.login(&username, &password)?)
                }
            }
            Command::Register(form) => Reply::success(self.accounts.register(&form)?),
            Command::ClearToken => {
                let cleared = match self.properties.remove(&[keys::USERNAME, keys::PASSWORD]) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Failed to clear credentials: {}", e);
                        false
                    }
                };
                Reply::success(cleared)
            }

            Command::DataLocal => {
                Reply::value(self.storage.current_root().to_string_lossy().into_owned())
            }
            Command::Migrate(p) => {
                self.migrate(Path::new(&p.path))?;
                Reply::Empty
            }
            Command::GetExtendDirs => {
                let roots: Vec<String> = self
                    .storage
                    .candidate_roots()
                    .iter()
                    .map(|p| p.to_string_lossy().into_owned())
                    .collect();
                Reply::value(roots.join(EXTEND_DIRS_DELIMITER))
            }
            Command::Mkdirs(p) => {
                if p.path.is_empty() {
                    bail!("mkdirs needs a path");
                }
                fs::create_dir_all(&p.path)
                    .with_context(|| format!("Failed to create {}", p.path))?;
                Reply::Empty
            }

            Command::VerifyAuthentication => Reply::value(self.gate.confirm()),

            Command::FlatInvoke(p) => self.handle(&p.method, &p.params)?,
        };
        Ok(reply)
    }

    /// Move the data root to `target` and follow it with the property store.
    ///
    /// Publishes `migration_started`, one `migration_progress` per top-level
    /// entry, then `migration_finished` or `migration_failed`. A no-op
    /// migration or a relative target publishes nothing.
    pub fn migrate(&self, target: &Path) -> Result<MigrationOutcome> {
        let _guard = self.migration.lock().unwrap_or_else(PoisonError::into_inner);

        let from = self.storage.current_root();
        let to = self.storage.resolve_target(target);
        let moving = to.is_absolute() && !self.storage.is_current_root(&to);
        if moving {
            self.notifier.publish_event(&CoreEvent::MigrationStarted {
                from: from.to_string_lossy().into_owned(),
                to: to.to_string_lossy().into_owned(),
            });
        }

        let notifier = Arc::clone(&self.notifier);
        let result = self.storage.migrate_with(target, &mut |progress: &MigrationProgress| {
            notifier.publish_event(&CoreEvent::MigrationProgress {
                entry: progress.entry.clone(),
                done: progress.done,
                total: progress.total,
            });
        });
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                if moving {
                    self.notifier.publish_event(&CoreEvent::MigrationFailed {
                        error: e.to_string(),
                    });
                }
                return Err(e.into());
            }
        };

        if let MigrationOutcome::Moved { to, .. } = &outcome {
            self.properties.relocate(Paths::properties_file(to));
            self.notifier.publish_event(&CoreEvent::MigrationFinished {
                root: to.to_string_lossy().into_owned(),
            });
        }
        Ok(outcome)
    }

    fn credentials(&self) -> (String, String) {
        (
            self.properties.get(keys::USERNAME, ""),
            self.properties.get(keys::PASSWORD, ""),
        )
    }

    fn save(&self, name: &str, value: &str) -> bool {
        match self.properties.set(name, value) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to save property '{}': {}", name, e);
                false
            }
        }
    }
}

impl CommandHandler for AppCore {
    fn handle(&self, method: &str, params: &str) -> Result<Reply> {
        match Command::parse(method, params)? {
            Some(command) => self.execute(command),
            None => {
                debug!("No handler for '{}'", method);
                Ok(Reply::Unimplemented)
            }
        }
    }
}
