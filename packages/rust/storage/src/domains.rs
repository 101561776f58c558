//! Seen and saved domain tracking for diversity selection.
//!
//! Seen domains are scoped to `(owner, niche)`; saved domains are scoped to
//! the owner alone, so a saved company is recognised in every niche.

use libsql::params;
use prospector_shared::{DomainSet, NicheKey, Result, normalize_domain};

use crate::{Storage, db_err, now_rfc3339};

impl Storage {
    /// Record domains as shown to `owner_id` within `niche`.
    ///
    /// Domains are normalized first; blanks are skipped and repeats are
    /// ignored, so the first-seen timestamp never moves.
    pub async fn mark_domains_seen(
        &self,
        owner_id: &str,
        niche: &NicheKey,
        domains: &[String],
    ) -> Result<usize> {
        let _guard = self.begin_write().await?;
        let now = now_rfc3339();

        let tx = self.conn.transaction().await.map_err(db_err)?;
        let mut inserted = 0;
        for domain in domains {
            let domain = normalize_domain(domain);
            if domain.is_empty() {
                continue;
            }
            inserted += tx
                .execute(
                    "INSERT OR IGNORE INTO seen_domains (owner_id, niche_key, domain, first_seen_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![owner_id, niche.as_str(), domain.as_str(), now.as_str()],
                )
                .await
                .map_err(db_err)? as usize;
        }
        tx.commit().await.map_err(db_err)?;

        tracing::debug!(owner_id, niche = %niche, inserted, "marked domains seen");
        Ok(inserted)
    }

    /// Domains previously shown to `owner_id` within `niche`.
    pub async fn get_seen_domains(&self, owner_id: &str, niche: &NicheKey) -> Result<DomainSet> {
        let mut rows = self
            .conn
            .query(
                "SELECT domain FROM seen_domains WHERE owner_id = ?1 AND niche_key = ?2",
                params![owner_id, niche.as_str()],
            )
            .await
            .map_err(db_err)?;

        let mut domains = DomainSet::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            domains.insert(row.get::<String>(0).map_err(db_err)?);
        }
        Ok(domains)
    }

    /// Mark a domain as saved by `owner_id`. Returns `false` if it already was.
    pub async fn save_domain(&self, owner_id: &str, domain: &str) -> Result<bool> {
        let _guard = self.begin_write().await?;
        let domain = normalize_domain(domain);
        if domain.is_empty() {
            return Err(prospector_shared::ProspectorError::validation(
                "cannot save an empty domain",
            ));
        }

        let changed = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO saved_domains (owner_id, domain, saved_at) VALUES (?1, ?2, ?3)",
                params![owner_id, domain.as_str(), now_rfc3339()],
            )
            .await
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Remove a saved domain. Returns `false` if it was not saved.
    pub async fn unsave_domain(&self, owner_id: &str, domain: &str) -> Result<bool> {
        let _guard = self.begin_write().await?;
        let domain = normalize_domain(domain);
        let changed = self
            .conn
            .execute(
                "DELETE FROM saved_domains WHERE owner_id = ?1 AND domain = ?2",
                params![owner_id, domain.as_str()],
            )
            .await
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Domains saved by `owner_id`.
    pub async fn get_saved_domains(&self, owner_id: &str) -> Result<DomainSet> {
        let mut rows = self
            .conn
            .query(
                "SELECT domain FROM saved_domains WHERE owner_id = ?1",
                params![owner_id],
            )
            .await
            .map_err(db_err)?;

        let mut domains = DomainSet::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            domains.insert(row.get::<String>(0).map_err(db_err)?);
        }
        Ok(domains)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::test_storage;

    use super::*;

    #[tokio::test]
    async fn seen_domains_are_scoped_by_owner_and_niche() {
        let storage = test_storage().await;
        let saas = NicheKey::from_query("logistics saas");
        let fintech = NicheKey::from_query("fintech");

        let inserted = storage
            .mark_domains_seen(
                "owner-1",
                &saas,
                &["https://www.acme.io/".into(), "acme.io".into(), "".into(), "beta.com".into()],
            )
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let seen = storage.get_seen_domains("owner-1", &saas).await.unwrap();
        assert_eq!(seen, DomainSet::from(["acme.io".to_string(), "beta.com".to_string()]));

        assert!(storage.get_seen_domains("owner-1", &fintech).await.unwrap().is_empty());
        assert!(storage.get_seen_domains("owner-2", &saas).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn marking_twice_is_idempotent() {
        let storage = test_storage().await;
        let niche = NicheKey::from_query("robotics");
        storage.mark_domains_seen("o", &niche, &["a.com".into()]).await.unwrap();
        let again = storage.mark_domains_seen("o", &niche, &["a.com".into()]).await.unwrap();
        assert_eq!(again, 0);
        assert_eq!(storage.get_seen_domains("o", &niche).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn save_and_unsave() {
        let storage = test_storage().await;
        assert!(storage.save_domain("o", "https://www.Acme.io/pricing").await.unwrap());
        assert!(!storage.save_domain("o", "acme.io").await.unwrap());

        let saved = storage.get_saved_domains("o").await.unwrap();
        assert!(saved.contains("acme.io"));
        assert!(storage.get_saved_domains("someone-else").await.unwrap().is_empty());

        assert!(storage.unsave_domain("o", "acme.io").await.unwrap());
        assert!(!storage.unsave_domain("o", "acme.io").await.unwrap());
        assert!(storage.get_saved_domains("o").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn saving_blank_domain_is_rejected() {
        let storage = test_storage().await;
        assert!(storage.save_domain("o", "  ").await.is_err());
    }
}
