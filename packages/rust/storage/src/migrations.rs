//! SQL migration definitions for the Prospector database.
//!
//! Migrations are applied in order on database open. Each migration records
//! its own version in `schema_migrations`.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: searches, companies, people",
            sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS searches (
    id                TEXT PRIMARY KEY,
    owner_id          TEXT NOT NULL,
    query             TEXT NOT NULL,
    niche_key         TEXT NOT NULL,
    created_at        TEXT NOT NULL,
    aggregate_insight TEXT
);

CREATE INDEX IF NOT EXISTS idx_searches_owner ON searches(owner_id, created_at);

CREATE TABLE IF NOT EXISTS companies (
    id            TEXT PRIMARY KEY,
    search_id     TEXT NOT NULL REFERENCES searches(id) ON DELETE CASCADE,
    name          TEXT NOT NULL,
    website       TEXT,
    domain        TEXT NOT NULL,
    description   TEXT NOT NULL DEFAULT '',
    industry      TEXT NOT NULL DEFAULT '',
    country       TEXT NOT NULL DEFAULT '',
    status        TEXT NOT NULL CHECK (status IN ('enriched', 'failed')),
    insight_json  TEXT,
    error_message TEXT,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_companies_search ON companies(search_id);

CREATE TABLE IF NOT EXISTS people (
    id         TEXT PRIMARY KEY,
    company_id TEXT NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    name       TEXT NOT NULL,
    email      TEXT,
    phone      TEXT,
    role       TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_people_company ON people(company_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Diversity tracking: seen_domains, saved_domains",
            sql: r#"
CREATE TABLE IF NOT EXISTS seen_domains (
    owner_id      TEXT NOT NULL,
    niche_key     TEXT NOT NULL,
    domain        TEXT NOT NULL,
    first_seen_at TEXT NOT NULL,
    PRIMARY KEY (owner_id, niche_key, domain)
);

CREATE TABLE IF NOT EXISTS saved_domains (
    owner_id TEXT NOT NULL,
    domain   TEXT NOT NULL,
    saved_at TEXT NOT NULL,
    PRIMARY KEY (owner_id, domain)
);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
