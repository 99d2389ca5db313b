//! The token manager: two ordered sections of tokens backed by the database.
//!
//! A [`TokenManager`] is an ordinary value owned by the caller. The database
//! is loaded once on open; from then on every mutation is written through
//! before the in-memory lists change, so a failed write leaves both views as
//! they were.
//!
//! All mutation goes through `&mut self`. Callers sharing a manager across
//! threads wrap it in a `Mutex`, which also serialises HOTP counter updates.

use std::path::Path;

use authenticator_core::{validate, Algorithm, OtpError, Verification};

use crate::config::StoreConfig;
use crate::db::TokenDb;
use crate::error::StoreError;
use crate::seal::{self, StoreKey};
use crate::token::{Section, Token};
use crate::unix_now;

/// Owner of all tokens of one store.
#[derive(Debug)]
pub struct TokenManager {
    db: TokenDb,
    key: StoreKey,
    config: StoreConfig,
    time_based: Vec<Token>,
    counter_based: Vec<Token>,
}

impl TokenManager {
    // ── Construction ───────────────────────────────────────────────

    /// Open (or create) the store at `path` and load both sections.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] / [`StoreError::Migration`] from the database.
    /// - [`StoreError::Decryption`] if `key` does not open the stored secrets.
    pub fn open(path: &Path, key: StoreKey, config: StoreConfig) -> Result<Self, StoreError> {
        Self::load(TokenDb::open(path)?, key, config)
    }

    /// Store that lives only in memory, for tests and ephemeral sessions.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_in_memory(key: StoreKey, config: StoreConfig) -> Result<Self, StoreError> {
        Self::load(TokenDb::open_in_memory()?, key, config)
    }

    fn load(db: TokenDb, key: StoreKey, config: StoreConfig) -> Result<Self, StoreError> {
        let time_based = db.load_section(Section::TimeBased, &key)?;
        let counter_based = db.load_section(Section::CounterBased, &key)?;
        tracing::debug!(
            time_based = time_based.len(),
            counter_based = counter_based.len(),
            "token store loaded"
        );
        Ok(Self {
            db,
            key,
            config,
            time_based,
            counter_based,
        })
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ── Queries ────────────────────────────────────────────────────

    /// Total number of tokens across both sections.
    #[must_use]
    pub fn number_of_tokens(&self) -> usize {
        self.time_based.len().saturating_add(self.counter_based.len())
    }

    /// Number of tokens in `section`.
    #[must_use]
    pub fn number_of_tokens_in(&self, section: Section) -> usize {
        self.section(section).len()
    }

    /// Whether any TOTP token exists (a UI uses this to run its refresh timer).
    #[must_use]
    pub fn has_time_based_tokens(&self) -> bool {
        !self.time_based.is_empty()
    }

    /// Token at `index` of `section`, or `None` past the end.
    #[must_use]
    pub fn token_at(&self, section: Section, index: usize) -> Option<&Token> {
        self.section(section).get(index)
    }

    /// All tokens of `section` in display order.
    #[must_use]
    pub fn tokens_in(&self, section: Section) -> &[Token] {
        self.section(section)
    }

    /// Section and index of the token with `id`.
    #[must_use]
    pub fn position_of(&self, id: &str) -> Option<(Section, usize)> {
        Section::ALL.into_iter().find_map(|section| {
            self.section(section)
                .iter()
                .position(|t| t.id() == id)
                .map(|index| (section, index))
        })
    }

    // ── Mutation ───────────────────────────────────────────────────

    /// Append `token` to the end of its section and persist it.
    ///
    /// Returns the index it was given.
    ///
    /// # Errors
    ///
    /// - [`StoreError::DuplicateToken`] if a token with the same id exists.
    /// - [`StoreError::Seal`] / [`StoreError::Database`] if persisting fails.
    pub fn add_token(&mut self, token: Token) -> Result<usize, StoreError> {
        if self.position_of(token.id()).is_some() {
            return Err(StoreError::DuplicateToken(token.id().to_string()));
        }
        let section = token.section();
        let index = self.section(section).len();

        let sealed = seal::seal(token.secret(), &self.key, token.id().as_bytes())?;
        self.db.insert_token(&token, index, &sealed, unix_now())?;

        tracing::info!(token_id = %token.id(), %section, index, "token added");
        self.section_mut(section).push(token);
        Ok(index)
    }

    /// Remove and return the token at `index` of `section`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::IndexOutOfBounds`] for a bad index.
    /// - [`StoreError::Database`] if persisting fails.
    pub fn remove_token_at(&mut self, section: Section, index: usize) -> Result<Token, StoreError> {
        self.check_index(section, index)?;

        let mut ids = self.ids(section);
        let id = ids.remove(index);
        let remaining: Vec<&str> = ids.iter().map(String::as_str).collect();
        self.db.delete_token(&id, section, &remaining)?;

        tracing::info!(token_id = %id, %section, index, "token removed");
        Ok(self.section_mut(section).remove(index))
    }

    /// Move the token at `from` to `to` within `section`, shifting the
    /// tokens in between.
    ///
    /// # Errors
    ///
    /// - [`StoreError::IndexOutOfBounds`] if either index is bad.
    /// - [`StoreError::Database`] if persisting fails.
    pub fn move_token(&mut self, section: Section, from: usize, to: usize) -> Result<(), StoreError> {
        self.check_index(section, from)?;
        self.check_index(section, to)?;
        if from == to {
            return Ok(());
        }

        let mut ids = self.ids(section);
        let moved = ids.remove(from);
        ids.insert(to, moved);
        let order: Vec<&str> = ids.iter().map(String::as_str).collect();
        self.db.reorder(section, &order)?;

        let tokens = self.section_mut(section);
        let token = tokens.remove(from);
        tracing::info!(token_id = %token.id(), %section, from, to, "token moved");
        tokens.insert(to, token);
        Ok(())
    }

    // ── Codes ──────────────────────────────────────────────────────

    /// Code currently shown for the token at `index` of `section`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::IndexOutOfBounds`] for a bad index.
    /// - [`StoreError::Otp`] if `now` precedes the TOTP epoch.
    pub fn code_at(&self, section: Section, index: usize, now: u64) -> Result<String, StoreError> {
        Ok(self.get(section, index)?.code_at(now)?)
    }

    /// Advance the HOTP token at `index` to its next counter, persist it and
    /// return the new code.
    ///
    /// # Errors
    ///
    /// - [`StoreError::IndexOutOfBounds`] for a bad index.
    /// - [`StoreError::Otp`] if the counter is exhausted.
    /// - [`StoreError::Database`] if persisting fails.
    pub fn next_hotp_code(&mut self, index: usize) -> Result<String, StoreError> {
        let token = self.get(Section::CounterBased, index)?;
        let next = token
            .counter()
            .checked_add(1)
            .ok_or_else(|| OtpError::InvalidParameters("HOTP counter exhausted".into()))?;
        let id = token.id().to_string();

        self.db.update_counter(&id, next)?;
        tracing::debug!(token_id = %id, counter = next, "HOTP counter advanced");

        let token = &mut self.counter_based[index];
        token.set_counter(next);
        Ok(token.code_at(0)?)
    }

    /// Verify a code typed by the user against the token at `index`.
    ///
    /// HOTP: the stored counter and the configured look-ahead form the
    /// window; on a match the counter moves past the matched one, so the
    /// same code never verifies twice.
    ///
    /// TOTP: the step of `now` and the configured drift window form the
    /// window; on a match the step is recorded and codes from that step or
    /// earlier are rejected afterwards.
    ///
    /// State changes are persisted before this returns.
    ///
    /// # Errors
    ///
    /// - [`StoreError::IndexOutOfBounds`] for a bad index.
    /// - [`StoreError::Otp`] if `now` precedes the TOTP epoch.
    /// - [`StoreError::Database`] if persisting fails.
    pub fn verify_code(
        &mut self,
        section: Section,
        index: usize,
        candidate: &str,
        now: u64,
    ) -> Result<Verification, StoreError> {
        let token = self.get(section, index)?;
        let algorithm = token.algorithm();
        let (moving_factor, window) = match algorithm {
            Algorithm::Hotp => (token.counter(), self.config.hotp_look_ahead),
            Algorithm::Totp(_) => (now, self.config.totp_drift_window),
        };

        let result = validate(
            token.secret().expose(),
            algorithm,
            token.digest(),
            token.length(),
            candidate,
            moving_factor,
            window,
        )?;

        let reference = algorithm.counter_for(moving_factor)?;
        let Some(matched) = result.matched_counter(reference) else {
            return Ok(Verification::NoMatch);
        };
        let id = token.id().to_string();

        match algorithm {
            Algorithm::Hotp => {
                let next = matched
                    .checked_add(1)
                    .ok_or_else(|| OtpError::InvalidParameters("HOTP counter exhausted".into()))?;
                self.db.update_counter(&id, next)?;
                tracing::debug!(token_id = %id, counter = next, "HOTP counter advanced");
                self.section_mut(section)[index].set_counter(next);
            }
            Algorithm::Totp(_) => {
                if token.last_accepted_step().is_some_and(|last| matched <= last) {
                    tracing::warn!(token_id = %id, step = matched, "rejected replayed TOTP code");
                    return Ok(Verification::NoMatch);
                }
                self.db.update_last_accepted_step(&id, matched)?;
                self.section_mut(section)[index].set_last_accepted_step(matched);
            }
        }

        Ok(result)
    }

    // ── Internals ──────────────────────────────────────────────────

    fn section(&self, section: Section) -> &Vec<Token> {
        match section {
            Section::TimeBased => &self.time_based,
            Section::CounterBased => &self.counter_based,
        }
    }

    fn section_mut(&mut self, section: Section) -> &mut Vec<Token> {
        match section {
            Section::TimeBased => &mut self.time_based,
            Section::CounterBased => &mut self.counter_based,
        }
    }

    fn ids(&self, section: Section) -> Vec<String> {
        self.section(section)
            .iter()
            .map(|t| t.id().to_string())
            .collect()
    }

    fn check_index(&self, section: Section, index: usize) -> Result<(), StoreError> {
        let len = self.section(section).len();
        if index < len {
            Ok(())
        } else {
            Err(StoreError::IndexOutOfBounds {
                section,
                index,
                len,
            })
        }
    }

    fn get(&self, section: Section, index: usize) -> Result<&Token, StoreError> {
        self.check_index(section, index)?;
        Ok(&self.section(section)[index])
    }
}
