//! SQL schema for the Popcorn SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id     TEXT PRIMARY KEY,
    username    TEXT NOT NULL UNIQUE,
    enabled     INTEGER NOT NULL DEFAULT 1,
    permissions TEXT NOT NULL DEFAULT '[]',   -- JSON array of capabilities
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS movies (
    movie_id       TEXT PRIMARY KEY,
    title          TEXT NOT NULL,
    movie_type     TEXT NOT NULL,             -- 'movie' | 'series'
    status         TEXT NOT NULL,             -- 'waiting' | 'accepted' | 'rejected'
    rating         REAL,                      -- mean of ratings.rate
    favorite_count INTEGER NOT NULL DEFAULT 0,
    created_by     TEXT NOT NULL REFERENCES users(user_id),
    created_at     TEXT NOT NULL
);

-- Every version of every field value. Rows are only hard-deleted when a
-- pending proposal is withdrawn by its author.
CREATE TABLE IF NOT EXISTS field_instances (
    instance_id         TEXT PRIMARY KEY,
    movie_id            TEXT NOT NULL REFERENCES movies(movie_id) ON DELETE CASCADE,
    kind                TEXT NOT NULL,        -- FieldKind discriminant
    value_json          TEXT NOT NULL,        -- JSON payload (inner data only)
    status              TEXT NOT NULL,
    reported_for_update INTEGER NOT NULL DEFAULT 0,
    reported_for_delete INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS contributions (
    contribution_id      TEXT PRIMARY KEY,
    movie_id             TEXT NOT NULL REFERENCES movies(movie_id) ON DELETE CASCADE,
    user_id              TEXT NOT NULL REFERENCES users(user_id),
    kind                 TEXT NOT NULL,
    status               TEXT NOT NULL,
    ids_to_add           TEXT NOT NULL DEFAULT '[]',   -- JSON array
    ids_to_update        TEXT NOT NULL DEFAULT '{}',   -- JSON object new -> old
    ids_to_delete        TEXT NOT NULL DEFAULT '[]',   -- JSON array
    sources              TEXT NOT NULL,                -- JSON array
    user_comment         TEXT,
    created_at           TEXT NOT NULL,
    verified_at          TEXT,
    verified_by          TEXT REFERENCES users(user_id),
    verification_comment TEXT
);

CREATE TABLE IF NOT EXISTS ratings (
    movie_id TEXT NOT NULL REFERENCES movies(movie_id) ON DELETE CASCADE,
    user_id  TEXT NOT NULL REFERENCES users(user_id),
    rate     INTEGER NOT NULL CHECK (rate BETWEEN 1 AND 10),
    rated_at TEXT NOT NULL,
    PRIMARY KEY (movie_id, user_id)
);

CREATE TABLE IF NOT EXISTS favorites (
    movie_id TEXT NOT NULL REFERENCES movies(movie_id) ON DELETE CASCADE,
    user_id  TEXT NOT NULL REFERENCES users(user_id),
    added_at TEXT NOT NULL,
    PRIMARY KEY (movie_id, user_id)
);

CREATE INDEX IF NOT EXISTS instances_movie_kind_idx ON field_instances(movie_id, kind);
CREATE INDEX IF NOT EXISTS contributions_movie_idx  ON contributions(movie_id);
CREATE INDEX IF NOT EXISTS contributions_status_idx ON contributions(status);

PRAGMA user_version = 1;
";
