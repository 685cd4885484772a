//! Purpose: Track the lifecycle of each cached statement owned by a store.
//! Exports: `StatementKind`, `StatementState`, `StatementTable`.
//! Role: Guard rail between the store and the engine's prepared-statement cache.
//! Invariants: Transitions are Unprepared -> Ready (prepare), Ready -> Stepped (bind + step),
//! Stepped -> Ready (reset), any -> Unprepared (finalize).
//! Invariants: Binding is refused while a statement is Stepped.
use crate::core::error::{Error, ErrorKind};
use crate::core::schema;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StatementKind {
    Select,
    Upsert,
    DeleteKey,
    DeleteAll,
    Begin,
    Commit,
}

impl StatementKind {
    pub const ALL: [StatementKind; 6] = [
        StatementKind::Select,
        StatementKind::Upsert,
        StatementKind::DeleteKey,
        StatementKind::DeleteAll,
        StatementKind::Begin,
        StatementKind::Commit,
    ];

    pub fn sql(self) -> &'static str {
        match self {
            StatementKind::Select => schema::SQL_SELECT,
            StatementKind::Upsert => schema::SQL_UPSERT,
            StatementKind::DeleteKey => schema::SQL_DELETE_KEY,
            StatementKind::DeleteAll => schema::SQL_DELETE_ALL,
            StatementKind::Begin => schema::SQL_BEGIN,
            StatementKind::Commit => schema::SQL_COMMIT,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Upsert => "upsert",
            StatementKind::DeleteKey => "delete_key",
            StatementKind::DeleteAll => "delete_all",
            StatementKind::Begin => "begin",
            StatementKind::Commit => "commit",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum StatementState {
    #[default]
    Unprepared,
    Ready,
    Stepped,
}

#[derive(Clone, Debug, Default)]
pub struct StatementTable {
    states: [StatementState; StatementKind::ALL.len()],
}

impl StatementTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, kind: StatementKind) -> StatementState {
        self.states[kind.slot()]
    }

    /// Checks that `kind` may be bound. Fails without changing state when the statement
    /// still holds a stepped row.
    pub fn check_bindable(&self, kind: StatementKind) -> Result<(), Error> {
        if self.state(kind) == StatementState::Stepped {
            return Err(Error::new(ErrorKind::Misuse)
                .with_message(format!(
                    "{} statement is still stepped; reset it before binding again",
                    kind.name()
                ))
                .with_hint("Call reset_select after consuming the previous read."));
        }
        Ok(())
    }

    /// Records a successful prepare (or cache hit). Returns true on the first prepare.
    pub fn mark_prepared(&mut self, kind: StatementKind) -> bool {
        let slot = &mut self.states[kind.slot()];
        match slot {
            StatementState::Unprepared => {
                *slot = StatementState::Ready;
                true
            }
            StatementState::Ready | StatementState::Stepped => false,
        }
    }

    pub fn mark_stepped(&mut self, kind: StatementKind) -> Result<(), Error> {
        let slot = &mut self.states[kind.slot()];
        match slot {
            StatementState::Ready => {
                *slot = StatementState::Stepped;
                Ok(())
            }
            StatementState::Unprepared => Err(Error::new(ErrorKind::Internal)
                .with_message(format!("{} statement stepped before prepare", kind.name()))),
            StatementState::Stepped => Err(Error::new(ErrorKind::Misuse)
                .with_message(format!("{} statement stepped twice without reset", kind.name()))),
        }
    }

    /// Stepped -> Ready. A reset of a statement that is not stepped is a no-op, mirroring
    /// the engine.
    pub fn mark_reset(&mut self, kind: StatementKind) {
        let slot = &mut self.states[kind.slot()];
        if *slot == StatementState::Stepped {
            *slot = StatementState::Ready;
        }
    }

    /// Returns the number of statements that had been prepared.
    pub fn finalize_all(&mut self) -> usize {
        let prepared = self
            .states
            .iter()
            .filter(|state| **state != StatementState::Unprepared)
            .count();
        self.states = [StatementState::Unprepared; StatementKind::ALL.len()];
        prepared
    }

    pub fn prepared_count(&self) -> usize {
        self.states
            .iter()
            .filter(|state| **state != StatementState::Unprepared)
            .count()
    }
}
