use std::fmt;

/// One step of a signal name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SignalIdPart {
    /// A named structure member
    Name(&'static str),
    /// A concrete slot within a container
    Index(usize),
    /// The full extent of a container, used when printing shapes
    Dim(usize),
}

/// SignalId is the hierarchical name of a member, e.g. `SST[1].data[517]`.
///
/// Ids are built while descending through an event structure. They are only
/// materialized for naming, dumping and setup, never on the per-event map path.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignalId {
    parts: Vec<SignalIdPart>,
}

impl SignalId {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(name: &'static str) -> Self {
        Self {
            parts: vec![SignalIdPart::Name(name)],
        }
    }

    /// A new id with a member name appended
    pub fn with_name(&self, name: &'static str) -> Self {
        self.with_part(SignalIdPart::Name(name))
    }

    /// A new id with a slot index appended
    pub fn with_index(&self, index: usize) -> Self {
        self.with_part(SignalIdPart::Index(index))
    }

    /// A new id with a container dimension appended
    pub fn with_dim(&self, dim: usize) -> Self {
        self.with_part(SignalIdPart::Dim(dim))
    }

    fn with_part(&self, part: SignalIdPart) -> Self {
        let mut parts = Vec::with_capacity(self.parts.len() + 1);
        parts.extend_from_slice(&self.parts);
        parts.push(part);
        Self { parts }
    }

    pub fn parts(&self) -> &[SignalIdPart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, part) in self.parts.iter().enumerate() {
            match part {
                SignalIdPart::Name(name) => {
                    if idx > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{name}")?;
                }
                SignalIdPart::Index(i) => write!(f, "[{i}]")?,
                SignalIdPart::Dim(n) => write!(f, "[{n}]")?,
            }
        }
        Ok(())
    }
}
