//! Search runs, their companies, and contact people.

use chrono::{DateTime, Utc};
use libsql::{Connection, params};
use prospector_shared::{
    CompanyOutcome, InsightPayload, NicheKey, Person, ProspectorError, Result, SearchId,
    normalize_website,
};
use uuid::Uuid;

use crate::{Storage, db_err, now_rfc3339, parse_timestamp};

const STATUS_ENRICHED: &str = "enriched";
const STATUS_FAILED: &str = "failed";

/// A persisted search run.
#[derive(Debug, Clone)]
pub struct SearchRecord {
    pub id: SearchId,
    pub owner_id: String,
    pub query: String,
    pub niche_key: String,
    pub created_at: DateTime<Utc>,
    /// `None` until the aggregate insight task finishes.
    pub aggregate_insight: Option<String>,
}

/// A persisted company row with its outcome rebuilt.
#[derive(Debug, Clone)]
pub struct CompanyRecord {
    pub id: String,
    pub search_id: String,
    /// Normalized domain, empty when the company had no website.
    pub domain: String,
    pub outcome: CompanyOutcome,
    pub created_at: DateTime<Utc>,
}

impl Storage {
    // -----------------------------------------------------------------------
    // Search operations
    // -----------------------------------------------------------------------

    /// Insert a new search record.
    pub async fn insert_search(
        &self,
        id: &SearchId,
        owner_id: &str,
        query: &str,
        niche_key: &NicheKey,
    ) -> Result<()> {
        let _guard = self.begin_write().await?;
        let now = now_rfc3339();
        self.conn
            .execute(
                "INSERT INTO searches (id, owner_id, query, niche_key, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.to_string(),
                    owner_id,
                    query,
                    niche_key.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Attach the aggregate insight to a search.
    pub async fn update_search_insight(&self, id: &SearchId, insight: &str) -> Result<()> {
        let _guard = self.begin_write().await?;
        let changed = self
            .conn
            .execute(
                "UPDATE searches SET aggregate_insight = ?1 WHERE id = ?2",
                params![insight, id.to_string()],
            )
            .await
            .map_err(db_err)?;
        if changed == 0 {
            return Err(ProspectorError::Storage(format!("search {id} not found")));
        }
        Ok(())
    }

    /// Get one search by ID.
    pub async fn get_search(&self, id: &SearchId) -> Result<Option<SearchRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, owner_id, query, niche_key, created_at, aggregate_insight
                 FROM searches WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_search(&row)?)),
            None => Ok(None),
        }
    }

    /// List searches, newest first, optionally filtered by owner.
    pub async fn list_searches(&self, owner_id: Option<&str>, limit: u32) -> Result<Vec<SearchRecord>> {
        let mut rows = match owner_id {
            Some(owner) => self
                .conn
                .query(
                    "SELECT id, owner_id, query, niche_key, created_at, aggregate_insight
                     FROM searches WHERE owner_id = ?1
                     ORDER BY created_at DESC, id DESC LIMIT ?2",
                    params![owner, limit],
                )
                .await
                .map_err(db_err)?,
            None => self
                .conn
                .query(
                    "SELECT id, owner_id, query, niche_key, created_at, aggregate_insight
                     FROM searches ORDER BY created_at DESC, id DESC LIMIT ?1",
                    params![limit],
                )
                .await
                .map_err(db_err)?,
        };

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_search(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Company operations
    // -----------------------------------------------------------------------

    /// Insert one company outcome. Returns the generated company ID.
    pub async fn insert_company(&self, search_id: &SearchId, outcome: &CompanyOutcome) -> Result<String> {
        let _guard = self.begin_write().await?;
        insert_company_on(&self.conn, search_id, outcome).await
    }

    /// Insert several company outcomes in one transaction.
    ///
    /// Returns the generated IDs in input order. Nothing is written if any
    /// row fails.
    pub async fn insert_companies(
        &self,
        search_id: &SearchId,
        outcomes: &[CompanyOutcome],
    ) -> Result<Vec<String>> {
        let _guard = self.begin_write().await?;
        if outcomes.is_empty() {
            return Ok(Vec::new());
        }

        let tx = self.conn.transaction().await.map_err(db_err)?;
        let mut ids = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            ids.push(insert_company_on(&tx, search_id, outcome).await?);
        }
        tx.commit().await.map_err(db_err)?;
        Ok(ids)
    }

    /// List all companies recorded for a search, in insertion order.
    pub async fn list_companies_by_search(&self, search_id: &SearchId) -> Result<Vec<CompanyRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, search_id, name, website, domain, description, industry, country,
                        status, insight_json, error_message, created_at
                 FROM companies WHERE search_id = ?1 ORDER BY rowid",
                params![search_id.to_string()],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_company(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // People operations
    // -----------------------------------------------------------------------

    /// Insert contact people for a company. Returns the number inserted.
    pub async fn insert_people(&self, company_id: &str, people: &[Person]) -> Result<usize> {
        let _guard = self.begin_write().await?;
        if people.is_empty() {
            return Ok(0);
        }

        let now = now_rfc3339();
        let tx = self.conn.transaction().await.map_err(db_err)?;
        for person in people {
            let id = Uuid::now_v7().to_string();
            tx.execute(
                "INSERT INTO people (id, company_id, name, email, phone, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.as_str(),
                    company_id,
                    person.name.as_str(),
                    person.email.as_deref(),
                    person.phone.as_deref(),
                    person.role.as_deref(),
                    now.as_str()
                ],
            )
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(people.len())
    }

    /// List the contact people recorded for a company.
    pub async fn list_people_by_company(&self, company_id: &str) -> Result<Vec<Person>> {
        let mut rows = self
            .conn
            .query(
                "SELECT name, email, phone, role FROM people WHERE company_id = ?1 ORDER BY rowid",
                params![company_id],
            )
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(Person {
                name: row.get::<String>(0).map_err(db_err)?,
                email: row.get::<String>(1).ok(),
                phone: row.get::<String>(2).ok(),
                role: row.get::<String>(3).ok(),
            });
        }
        Ok(results)
    }
}

async fn insert_company_on(conn: &Connection, search_id: &SearchId, outcome: &CompanyOutcome) -> Result<String> {
    let id = Uuid::now_v7().to_string();
    let now = now_rfc3339();
    let domain = normalize_website(outcome.website());

    let (industry, country, status, insight_json, error_message) = match outcome {
        CompanyOutcome::Success {
            industry,
            country,
            extracted,
            ..
        } => {
            let json = serde_json::to_string(extracted)
                .map_err(|e| ProspectorError::Storage(format!("serialize insight: {e}")))?;
            (industry.as_str(), country.as_str(), STATUS_ENRICHED, Some(json), None)
        }
        CompanyOutcome::Failure { error_message, .. } => {
            ("", "", STATUS_FAILED, None, Some(error_message.as_str()))
        }
    };

    conn.execute(
        "INSERT INTO companies (id, search_id, name, website, domain, description, industry,
                                country, status, insight_json, error_message, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            id.as_str(),
            search_id.to_string(),
            outcome.name(),
            outcome.website(),
            domain.as_str(),
            outcome.description(),
            industry,
            country,
            status,
            insight_json,
            error_message,
            now.as_str()
        ],
    )
    .await
    .map_err(db_err)?;

    Ok(id)
}

fn row_to_search(row: &libsql::Row) -> Result<SearchRecord> {
    let raw_id: String = row.get(0).map_err(db_err)?;
    let id = raw_id
        .parse::<SearchId>()
        .map_err(|e| ProspectorError::Storage(format!("invalid search id '{raw_id}': {e}")))?;
    let created_at: String = row.get(4).map_err(db_err)?;

    Ok(SearchRecord {
        id,
        owner_id: row.get::<String>(1).map_err(db_err)?,
        query: row.get::<String>(2).map_err(db_err)?,
        niche_key: row.get::<String>(3).map_err(db_err)?,
        created_at: parse_timestamp(&created_at)?,
        aggregate_insight: row.get::<String>(5).ok(),
    })
}

fn row_to_company(row: &libsql::Row) -> Result<CompanyRecord> {
    let id: String = row.get(0).map_err(db_err)?;
    let name: String = row.get(2).map_err(db_err)?;
    let website: Option<String> = row.get::<String>(3).ok();
    let description: String = row.get(5).map_err(db_err)?;
    let status: String = row.get(8).map_err(db_err)?;

    let outcome = match status.as_str() {
        STATUS_ENRICHED => {
            let json: String = row.get(9).map_err(db_err)?;
            let extracted: InsightPayload = serde_json::from_str(&json)
                .map_err(|e| ProspectorError::Storage(format!("company {id}: bad insight json: {e}")))?;
            CompanyOutcome::Success {
                name,
                website,
                description,
                industry: row.get::<String>(6).map_err(db_err)?,
                country: row.get::<String>(7).map_err(db_err)?,
                extracted,
            }
        }
        STATUS_FAILED => CompanyOutcome::Failure {
            name,
            website,
            description,
            error_message: row.get::<String>(10).unwrap_or_default(),
        },
        other => {
            return Err(ProspectorError::Storage(format!(
                "company {id}: unknown status '{other}'"
            )));
        }
    };

    let created_at: String = row.get(11).map_err(db_err)?;
    Ok(CompanyRecord {
        search_id: row.get::<String>(1).map_err(db_err)?,
        domain: row.get::<String>(4).map_err(db_err)?,
        created_at: parse_timestamp(&created_at)?,
        id,
        outcome,
    })
}
