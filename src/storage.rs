// ABOUTME: SQLite persistence layer for accounts and evidence records via SeaORM
// ABOUTME: Implements the auth backend seam; the only place raw database errors are classified

use anyhow::Result;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng};
use argon2::Argon2;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use uuid::Uuid;

use crate::backend::{AccountIdentity, AuthBackend, BackendError, Preferences};
use crate::entities::{account, evidence};
use crate::migration::Migrator;

pub struct Storage {
    pub db: DatabaseConnection,
}

impl Storage {
    pub async fn new(db_url: &str) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let db = Database::connect(db_url).await?;
        Migrator::up(&db, None).await?;

        Ok(Self { db })
    }

    pub async fn find_account_by_email(&self, email: &str) -> Result<Option<account::Model>, DbErr> {
        account::Entity::find()
            .filter(account::Column::Email.eq(email))
            .one(&self.db)
            .await
    }

    pub async fn find_account(&self, account_id: &str) -> Result<Option<account::Model>, DbErr> {
        account::Entity::find_by_id(account_id).one(&self.db).await
    }

    pub async fn insert_account(
        &self,
        account_id: &str,
        email: &str,
        password_hash: &str,
        display_name: &str,
    ) -> Result<account::Model, DbErr> {
        let record = account::ActiveModel {
            id: Set(account_id.to_string()),
            email: Set(email.to_string()),
            password_hash: Set(password_hash.to_string()),
            display_name: Set(display_name.to_string()),
            pref_language: Set(None),
            pref_calendar: Set(None),
            created_at: Set(chrono::Utc::now().timestamp()),
        };

        record.insert(&self.db).await
    }

    pub async fn insert_evidence(
        &self,
        account_id: &str,
        storage_key: &str,
        incident_kind: &str,
        description: &str,
        threat_level: i32,
    ) -> Result<evidence::Model, DbErr> {
        let record = evidence::ActiveModel {
            id: Set(Uuid::new_v4()),
            account_id: Set(account_id.to_string()),
            storage_key: Set(storage_key.to_string()),
            incident_kind: Set(incident_kind.to_string()),
            description: Set(description.to_string()),
            threat_level: Set(threat_level),
            archived: Set(false),
            captured_at: Set(chrono::Utc::now().timestamp()),
        };

        record.insert(&self.db).await
    }

    pub async fn find_evidence(
        &self,
        account_id: &str,
        record_id: Uuid,
    ) -> Result<Option<evidence::Model>, DbErr> {
        evidence::Entity::find_by_id(record_id)
            .filter(evidence::Column::AccountId.eq(account_id))
            .one(&self.db)
            .await
    }

    pub async fn find_evidence_by_key(
        &self,
        account_id: &str,
        storage_key: &str,
    ) -> Result<Option<evidence::Model>, DbErr> {
        evidence::Entity::find()
            .filter(evidence::Column::AccountId.eq(account_id))
            .filter(evidence::Column::StorageKey.eq(storage_key))
            .one(&self.db)
            .await
    }

    pub async fn list_evidence(&self, account_id: &str) -> Result<Vec<evidence::Model>, DbErr> {
        evidence::Entity::find()
            .filter(evidence::Column::AccountId.eq(account_id))
            .order_by_desc(evidence::Column::CapturedAt)
            .all(&self.db)
            .await
    }

    pub async fn update_evidence(
        &self,
        account_id: &str,
        record_id: Uuid,
        description: Option<String>,
        threat_level: Option<i32>,
        incident_kind: Option<String>,
        archived: Option<bool>,
    ) -> Result<Option<evidence::Model>, DbErr> {
        let Some(existing) = self.find_evidence(account_id, record_id).await? else {
            return Ok(None);
        };

        let mut active: evidence::ActiveModel = existing.into();
        if let Some(description) = description {
            active.description = Set(description);
        }
        if let Some(threat_level) = threat_level {
            active.threat_level = Set(threat_level);
        }
        if let Some(incident_kind) = incident_kind {
            active.incident_kind = Set(incident_kind);
        }
        if let Some(archived) = archived {
            active.archived = Set(archived);
        }

        Ok(Some(active.update(&self.db).await?))
    }

    /// Idempotent: deleting an already-deleted record reports zero rows,
    /// not an error.
    pub async fn delete_evidence_record(
        &self,
        account_id: &str,
        record_id: Uuid,
    ) -> Result<u64, DbErr> {
        let result = evidence::Entity::delete_many()
            .filter(evidence::Column::Id.eq(record_id))
            .filter(evidence::Column::AccountId.eq(account_id))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }
}

fn hash_credential(credential: &str) -> Result<String, BackendError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(credential.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| BackendError::Unavailable(format!("credential hashing failed: {}", err)))
}

fn credential_matches(stored_hash: &str, credential: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(credential.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Maps raw database errors into the closed backend taxonomy. Uniqueness
/// violations are the disambiguation signal reconciliation depends on;
/// everything else is ambiguous and must not trigger account creation.
fn classify_db_err(err: DbErr) -> BackendError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => BackendError::AlreadyExists,
        _ => BackendError::Unavailable(err.to_string()),
    }
}

fn identity_of(model: &account::Model) -> AccountIdentity {
    AccountIdentity {
        id: model.id.clone(),
        email: model.email.clone(),
        display_name: model.display_name.clone(),
    }
}

#[async_trait]
impl AuthBackend for Storage {
    async fn sign_in(
        &self,
        email: &str,
        credential: &str,
    ) -> Result<AccountIdentity, BackendError> {
        let found = self
            .find_account_by_email(email)
            .await
            .map_err(classify_db_err)?;

        // Unknown account and credential mismatch collapse into one error:
        // callers must not be able to probe for account existence.
        match found {
            Some(model) if credential_matches(&model.password_hash, credential) => {
                Ok(identity_of(&model))
            }
            _ => Err(BackendError::InvalidCredentials),
        }
    }

    async fn create_account(
        &self,
        account_id: &str,
        email: &str,
        credential: &str,
        display_name: &str,
    ) -> Result<AccountIdentity, BackendError> {
        let password_hash = hash_credential(credential)?;
        let model = self
            .insert_account(account_id, email, &password_hash, display_name)
            .await
            .map_err(classify_db_err)?;

        Ok(identity_of(&model))
    }

    async fn current_identity(&self, account_id: &str) -> Result<AccountIdentity, BackendError> {
        let found = self.find_account(account_id).await.map_err(classify_db_err)?;

        found
            .map(|model| identity_of(&model))
            .ok_or_else(|| BackendError::Unavailable("session account missing".to_string()))
    }

    async fn get_preferences(&self, account_id: &str) -> Result<Preferences, BackendError> {
        let found = self.find_account(account_id).await.map_err(classify_db_err)?;

        found
            .map(|model| Preferences {
                language: model.pref_language,
                calendar: model.pref_calendar,
            })
            .ok_or_else(|| BackendError::Unavailable("session account missing".to_string()))
    }

    async fn set_preferences(
        &self,
        account_id: &str,
        prefs: &Preferences,
    ) -> Result<(), BackendError> {
        let active = account::ActiveModel {
            id: Set(account_id.to_string()),
            pref_language: Set(prefs.language.clone()),
            pref_calendar: Set(prefs.calendar.clone()),
            ..Default::default()
        };

        active.update(&self.db).await.map_err(classify_db_err)?;
        Ok(())
    }
}
