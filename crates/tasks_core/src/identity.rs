use crate::error::AppError;
use crate::storage::json_store::write_private;
use serde::{Deserialize, Serialize};
use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use std::path::{Path, PathBuf};
use tracing::info;

const ACCOUNTS_FILE_NAME: &str = "accounts.json";
const SESSION_FILE_NAME: &str = "session.json";
const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub uid: String,
    pub email: String,
}

pub type SessionCallback = Box<dyn FnMut(Option<&Session>)>;

pub trait IdentityProvider {
    fn sign_in(&mut self, email: &str, password: &str) -> Result<Session, AppError>;

    fn sign_up(&mut self, email: &str, password: &str) -> Result<Session, AppError>;

    fn sign_in_with_federated_provider(&mut self) -> Result<Session, AppError>;

    fn sign_out(&mut self) -> Result<(), AppError>;

    fn current_session(&self) -> Option<Session>;

    /// Registers an observer. It is called right away with the current
    /// session and again after every sign-in or sign-out.
    fn on_session_change(&mut self, callback: SessionCallback);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    uid: String,
    email: String,
    /// Argon2id PHC string, salt included.
    password_hash: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Accounts {
    #[serde(default)]
    users: Vec<Account>,
}

/// Email/password accounts kept next to the task data. There is no
/// federated provider locally.
pub struct LocalIdentity {
    dir: PathBuf,
    session: Option<Session>,
    observers: Vec<SessionCallback>,
}

impl LocalIdentity {
    pub fn open(dir: &Path) -> Result<Self, AppError> {
        let mut identity = Self {
            dir: dir.to_path_buf(),
            session: None,
            observers: Vec::new(),
        };

        let stored = read_json::<Session>(&identity.session_path())?;
        if let Some(session) = stored {
            let accounts = identity.load_accounts()?;
            if accounts.users.iter().any(|account| account.uid == session.uid) {
                identity.session = Some(session);
            } else {
                std::fs::remove_file(identity.session_path()).ok();
            }
        }

        Ok(identity)
    }

    fn accounts_path(&self) -> PathBuf {
        self.dir.join(ACCOUNTS_FILE_NAME)
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE_NAME)
    }

    fn load_accounts(&self) -> Result<Accounts, AppError> {
        Ok(read_json::<Accounts>(&self.accounts_path())?.unwrap_or_default())
    }

    fn save_accounts(&self, accounts: &Accounts) -> Result<(), AppError> {
        let content = serde_json::to_string_pretty(accounts)?;
        write_private(&self.accounts_path(), &content)
    }

    fn set_session(&mut self, session: Option<Session>) -> Result<(), AppError> {
        match &session {
            Some(session) => {
                let content = serde_json::to_string_pretty(session)?;
                write_private(&self.session_path(), &content)?;
                info!(uid = %session.uid, "signed in");
            }
            None => {
                let path = self.session_path();
                if path.exists() {
                    std::fs::remove_file(&path).map_err(|err| AppError::io(err.to_string()))?;
                }
                info!("signed out");
            }
        }

        self.session = session;
        for observer in &mut self.observers {
            observer(self.session.as_ref());
        }
        Ok(())
    }
}

impl IdentityProvider for LocalIdentity {
    fn sign_in(&mut self, email: &str, password: &str) -> Result<Session, AppError> {
        let email = check_credentials(email, password)?;
        let accounts = self.load_accounts()?;
        let account = accounts
            .users
            .iter()
            .find(|account| account.email == email)
            .ok_or_else(|| {
                AppError::auth("user-not-found", "There is no account for this email.")
            })?;

        if !verify_password(&account.password_hash, password)? {
            return Err(AppError::auth("wrong-password", "The password is incorrect."));
        }

        let session = Session {
            uid: account.uid.clone(),
            email: account.email.clone(),
        };
        self.set_session(Some(session.clone()))?;
        Ok(session)
    }

    fn sign_up(&mut self, email: &str, password: &str) -> Result<Session, AppError> {
        let email = check_credentials(email, password)?;
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AppError::auth(
                "weak-password",
                "Password should be at least 6 characters.",
            ));
        }

        let mut accounts = self.load_accounts()?;
        if accounts.users.iter().any(|account| account.email == email) {
            return Err(AppError::auth(
                "email-already-in-use",
                "The email address is already in use by another account.",
            ));
        }

        let account = Account {
            uid: uuid::Uuid::new_v4().simple().to_string(),
            email: email.clone(),
            password_hash: hash_password(password)?,
        };
        let session = Session {
            uid: account.uid.clone(),
            email,
        };
        accounts.users.push(account);
        self.save_accounts(&accounts)?;

        self.set_session(Some(session.clone()))?;
        Ok(session)
    }

    fn sign_in_with_federated_provider(&mut self) -> Result<Session, AppError> {
        Err(AppError::auth(
            "operation-not-allowed",
            "Federated sign-in is not available for local accounts.",
        ))
    }

    fn sign_out(&mut self) -> Result<(), AppError> {
        self.set_session(None)
    }

    fn current_session(&self) -> Option<Session> {
        self.session.clone()
    }

    fn on_session_change(&mut self, mut callback: SessionCallback) {
        callback(self.session.as_ref());
        self.observers.push(callback);
    }
}

/// Rejects missing or malformed credentials before touching the account file.
fn check_credentials(email: &str, password: &str) -> Result<String, AppError> {
    let email = email.trim().to_ascii_lowercase();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::auth(
            "missing-credentials",
            "Please enter email and password.",
        ));
    }

    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !well_formed {
        return Err(AppError::auth("invalid-email", "The email address is badly formatted."));
    }

    Ok(email)
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())
        .map_err(|err| AppError::io(format!("could not salt password: {err}")))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| AppError::io(format!("could not hash password: {err}")))?;
    Ok(hash.to_string())
}

fn verify_password(stored: &str, password: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored)
        .map_err(|err| AppError::invalid_data(format!("stored password hash is unreadable: {err}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, AppError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|err| AppError::io(err.to_string()))?;
    let value = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;
    Ok(Some(value))
}
