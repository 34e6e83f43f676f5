//! Identifier kinds, allocation targets and display formatting.
//!
//! Formatting is a pure, total function: every non-negative value renders, and the
//! digit width is a minimum (larger values simply render with more digits).
//!
//! | Kind | Pattern | Digit width |
//! |---|---|---|
//! | booking | `{scope}/{value}` | 8 |
//! | driver | `{scope}/DR{value}` | 4 |
//! | admin | `AD{value}` | 3 |
//! | passenger | `CU{value}` | 3 |
//!
//! Downstream systems parse these strings, so [`FormattedIdentifier::parse`] provides
//! the inverse mapping and only accepts canonical renderings.

use crate::error::ValidationError;
use crate::namespace::{Namespace, ScopeCode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of identifiers handed out by the allocator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    /// Booking ids, one stream per operator.
    Booking,
    /// Driver ids, one stream per operator.
    Driver,
    /// Admin ids, one global stream.
    Admin,
    /// Passenger ids, one global stream.
    Passenger,
}

impl IdentifierKind {
    /// Every kind, in a stable order.
    pub const ALL: [Self; 4] = [Self::Booking, Self::Driver, Self::Admin, Self::Passenger];

    /// Whether identifiers of this kind are partitioned by a scope code.
    #[must_use]
    pub const fn requires_scope(self) -> bool {
        matches!(self, Self::Booking | Self::Driver)
    }

    /// Prefix of the counter namespace for this kind.
    #[must_use]
    pub const fn namespace_prefix(self) -> &'static str {
        match self {
            Self::Booking => "bookingId",
            Self::Driver => "driverId",
            Self::Admin => "adminId",
            Self::Passenger => "passengerId",
        }
    }

    /// Minimum number of digits of the sequence part.
    #[must_use]
    pub const fn digit_width(self) -> usize {
        match self {
            Self::Booking => 8,
            Self::Driver => 4,
            Self::Admin | Self::Passenger => 3,
        }
    }

    /// Lower-case name, as used in routes, logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Booking => "booking",
            Self::Driver => "driver",
            Self::Admin => "admin",
            Self::Passenger => "passenger",
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format a sequence value as a display identifier.
///
/// `scope_code` is ignored for global kinds (admin, passenger).
///
/// # Examples
///
/// ```
/// use seqalloc_core::identifier::{format_identifier, IdentifierKind};
///
/// assert_eq!(format_identifier(IdentifierKind::Booking, "OP001", 1), "OP001/00000001");
/// assert_eq!(format_identifier(IdentifierKind::Driver, "OP001", 42), "OP001/DR0042");
/// assert_eq!(format_identifier(IdentifierKind::Admin, "", 3), "AD003");
/// assert_eq!(format_identifier(IdentifierKind::Passenger, "", 3), "CU003");
/// ```
#[must_use]
pub fn format_identifier(kind: IdentifierKind, scope_code: &str, value: u64) -> String {
    let width = kind.digit_width();
    match kind {
        IdentifierKind::Booking => format!("{scope_code}/{value:0width$}"),
        IdentifierKind::Driver => format!("{scope_code}/DR{value:0width$}"),
        IdentifierKind::Admin => format!("AD{value:0width$}"),
        IdentifierKind::Passenger => format!("CU{value:0width$}"),
    }
}

/// A validated allocation request: the kind plus, for scoped kinds, its scope code.
///
/// This is the single place where caller input is checked. Once a target exists, the
/// namespace it maps to is well formed and no further validation happens downstream.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AllocationTarget {
    /// A booking id for one operator.
    Booking(ScopeCode),
    /// A driver id for one operator.
    Driver(ScopeCode),
    /// A global admin id.
    Admin,
    /// A global passenger id.
    Passenger,
}

impl AllocationTarget {
    /// Validate raw caller input into a target.
    ///
    /// Scoped kinds require a non-blank, well formed scope code. Global kinds accept no
    /// scope code (a blank one is treated as absent).
    ///
    /// # Errors
    ///
    /// - [`ValidationError::MissingScope`] when a scoped kind has no scope code
    /// - [`ValidationError::MalformedScope`] when the scope code is not well formed
    /// - [`ValidationError::UnexpectedScope`] when a global kind is given a scope code
    pub fn new(kind: IdentifierKind, scope_code: Option<&str>) -> Result<Self, ValidationError> {
        let scope_code = scope_code.filter(|raw| !raw.trim().is_empty());

        match (kind, scope_code) {
            (IdentifierKind::Booking | IdentifierKind::Driver, None) => {
                Err(ValidationError::MissingScope { kind })
            }
            (IdentifierKind::Booking, Some(raw)) => Ok(Self::Booking(raw.parse()?)),
            (IdentifierKind::Driver, Some(raw)) => Ok(Self::Driver(raw.parse()?)),
            (IdentifierKind::Admin | IdentifierKind::Passenger, Some(_)) => {
                Err(ValidationError::UnexpectedScope { kind })
            }
            (IdentifierKind::Admin, None) => Ok(Self::Admin),
            (IdentifierKind::Passenger, None) => Ok(Self::Passenger),
        }
    }

    /// The identifier kind of this target.
    #[must_use]
    pub const fn kind(&self) -> IdentifierKind {
        match self {
            Self::Booking(_) => IdentifierKind::Booking,
            Self::Driver(_) => IdentifierKind::Driver,
            Self::Admin => IdentifierKind::Admin,
            Self::Passenger => IdentifierKind::Passenger,
        }
    }

    /// The scope code, for scoped kinds.
    #[must_use]
    pub const fn scope(&self) -> Option<&ScopeCode> {
        match self {
            Self::Booking(scope) | Self::Driver(scope) => Some(scope),
            Self::Admin | Self::Passenger => None,
        }
    }

    /// The counter namespace backing this target.
    ///
    /// ```
    /// use seqalloc_core::identifier::{AllocationTarget, IdentifierKind};
    ///
    /// let driver = AllocationTarget::new(IdentifierKind::Driver, Some("OP001")).unwrap();
    /// assert_eq!(driver.namespace().as_str(), "driverId_OP001");
    /// assert_eq!(AllocationTarget::Admin.namespace().as_str(), "adminId");
    /// ```
    #[must_use]
    pub fn namespace(&self) -> Namespace {
        let prefix = self.kind().namespace_prefix();
        match self.scope() {
            Some(scope) => Namespace::new(format!("{prefix}_{scope}")),
            None => Namespace::new(prefix),
        }
    }

    /// Render an allocated value for this target.
    #[must_use]
    pub fn format(&self, value: u64) -> FormattedIdentifier {
        FormattedIdentifier {
            kind: self.kind(),
            scope: self.scope().cloned(),
            sequence_number: value,
            text: format_identifier(
                self.kind(),
                self.scope().map_or("", ScopeCode::as_str),
                value,
            ),
        }
    }
}

/// A rendered identifier together with the parts it was rendered from.
///
/// Derived and never persisted: the counter value is the source of truth.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FormattedIdentifier {
    kind: IdentifierKind,
    scope: Option<ScopeCode>,
    sequence_number: u64,
    text: String,
}

impl FormattedIdentifier {
    /// Parse a canonical identifier of the given kind.
    ///
    /// Only strings this module would itself render are accepted, so `"AD0001"` is
    /// rejected (the canonical form of 1 is `"AD001"`) while `"AD1000"` is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MalformedIdentifier`] if `input` does not match the
    /// pattern of `kind`.
    ///
    /// # Examples
    ///
    /// ```
    /// use seqalloc_core::identifier::{FormattedIdentifier, IdentifierKind};
    ///
    /// let id = FormattedIdentifier::parse(IdentifierKind::Driver, "OP001/DR0042").unwrap();
    /// assert_eq!(id.scope().map(|s| s.as_str()), Some("OP001"));
    /// assert_eq!(id.sequence_number(), 42);
    /// ```
    pub fn parse(kind: IdentifierKind, input: &str) -> Result<Self, ValidationError> {
        let malformed = || ValidationError::MalformedIdentifier {
            kind,
            input: input.to_string(),
        };

        let (scope, digits) = match kind {
            IdentifierKind::Booking => {
                let (scope, digits) = input.split_once('/').ok_or_else(malformed)?;
                (Some(scope), digits)
            }
            IdentifierKind::Driver => {
                let (scope, rest) = input.split_once('/').ok_or_else(malformed)?;
                (Some(scope), rest.strip_prefix("DR").ok_or_else(malformed)?)
            }
            IdentifierKind::Admin => (None, input.strip_prefix("AD").ok_or_else(malformed)?),
            IdentifierKind::Passenger => {
                (None, input.strip_prefix("CU").ok_or_else(malformed)?)
            }
        };

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let value: u64 = digits.parse().map_err(|_| malformed())?;
        let target = AllocationTarget::new(kind, scope).map_err(|_| malformed())?;

        let parsed = target.format(value);
        if parsed.text != input {
            return Err(malformed());
        }
        Ok(parsed)
    }

    /// The identifier kind.
    #[must_use]
    pub const fn kind(&self) -> IdentifierKind {
        self.kind
    }

    /// The scope code, for scoped kinds.
    #[must_use]
    pub const fn scope(&self) -> Option<&ScopeCode> {
        self.scope.as_ref()
    }

    /// The allocated counter value this identifier was rendered from.
    #[must_use]
    pub const fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// The rendered identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Consume and return the rendered identifier.
    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }
}

impl fmt::Display for FormattedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn formats_each_kind_exactly() {
        assert_eq!(
            format_identifier(IdentifierKind::Booking, "OP001", 1),
            "OP001/00000001"
        );
        assert_eq!(
            format_identifier(IdentifierKind::Driver, "OP001", 42),
            "OP001/DR0042"
        );
        assert_eq!(format_identifier(IdentifierKind::Admin, "", 3), "AD003");
        assert_eq!(format_identifier(IdentifierKind::Passenger, "", 3), "CU003");
    }

    #[test]
    fn width_is_a_minimum() {
        assert_eq!(format_identifier(IdentifierKind::Admin, "", 12_345), "AD12345");
        assert_eq!(
            format_identifier(IdentifierKind::Driver, "OP9", 123_456),
            "OP9/DR123456"
        );
        assert_eq!(
            format_identifier(IdentifierKind::Booking, "OP1", 1_234_567_890),
            "OP1/1234567890"
        );
    }

    #[test]
    fn global_kinds_ignore_scope_code() {
        assert_eq!(format_identifier(IdentifierKind::Admin, "OP001", 7), "AD007");
        assert_eq!(
            format_identifier(IdentifierKind::Passenger, "OP001", 7),
            "CU007"
        );
    }

    #[test]
    fn namespaces_per_kind() {
        let booking = AllocationTarget::new(IdentifierKind::Booking, Some("OP001")).unwrap();
        let driver = AllocationTarget::new(IdentifierKind::Driver, Some("OP001")).unwrap();

        assert_eq!(booking.namespace().as_str(), "bookingId_OP001");
        assert_eq!(driver.namespace().as_str(), "driverId_OP001");
        assert_eq!(AllocationTarget::Admin.namespace().as_str(), "adminId");
        assert_eq!(AllocationTarget::Passenger.namespace().as_str(), "passengerId");
    }

    #[test]
    fn scoped_kinds_require_scope() {
        for raw in [None, Some(""), Some("   ")] {
            assert_eq!(
                AllocationTarget::new(IdentifierKind::Booking, raw),
                Err(ValidationError::MissingScope {
                    kind: IdentifierKind::Booking
                })
            );
        }
        assert!(matches!(
            AllocationTarget::new(IdentifierKind::Driver, Some("OP/1")),
            Err(ValidationError::MalformedScope { .. })
        ));
    }

    #[test]
    fn global_kinds_reject_scope() {
        assert_eq!(
            AllocationTarget::new(IdentifierKind::Admin, Some("OP001")),
            Err(ValidationError::UnexpectedScope {
                kind: IdentifierKind::Admin
            })
        );
        assert_eq!(
            AllocationTarget::new(IdentifierKind::Passenger, Some("")),
            Ok(AllocationTarget::Passenger)
        );
    }

    #[test]
    fn kind_names_are_lower_case() {
        let names: Vec<String> = IdentifierKind::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["booking", "driver", "admin", "passenger"]);
    }

    #[test]
    fn parse_accepts_canonical_forms() {
        let booking = FormattedIdentifier::parse(IdentifierKind::Booking, "OP002/00000001").unwrap();
        assert_eq!(booking.scope().map(ScopeCode::as_str), Some("OP002"));
        assert_eq!(booking.sequence_number(), 1);

        let admin = FormattedIdentifier::parse(IdentifierKind::Admin, "AD1000").unwrap();
        assert_eq!(admin.scope(), None);
        assert_eq!(admin.sequence_number(), 1000);
    }

    #[test]
    fn parse_rejects_non_canonical_forms() {
        let cases = [
            (IdentifierKind::Admin, "AD0001"),
            (IdentifierKind::Admin, "AD"),
            (IdentifierKind::Admin, "CU001"),
            (IdentifierKind::Passenger, "CU-01"),
            (IdentifierKind::Booking, "OP001/1"),
            (IdentifierKind::Booking, "/00000001"),
            (IdentifierKind::Driver, "OP001/0042"),
            (IdentifierKind::Driver, "OP001/DR+042"),
        ];
        for (kind, input) in cases {
            assert!(
                FormattedIdentifier::parse(kind, input).is_err(),
                "{input:?} should not parse as {kind}"
            );
        }
    }

    proptest! {
        #[test]
        fn rendered_identifiers_parse_back(
            kind_index in 0usize..4,
            scope in "[A-Z0-9]{1,10}",
            value in any::<u64>(),
        ) {
            let kind = IdentifierKind::ALL[kind_index];
            let raw_scope = kind.requires_scope().then_some(scope.as_str());
            let target = AllocationTarget::new(kind, raw_scope).unwrap();
            let rendered = target.format(value);

            let parsed = FormattedIdentifier::parse(kind, rendered.as_str()).unwrap();
            prop_assert_eq!(parsed, rendered);
        }

        #[test]
        fn sequence_part_never_shorter_than_width(kind_index in 0usize..4, value in any::<u64>()) {
            let kind = IdentifierKind::ALL[kind_index];
            let rendered = format_identifier(kind, "OP1", value);
            let digits: String = rendered.chars().rev().take_while(char::is_ascii_digit).collect();
            prop_assert!(digits.len() >= kind.digit_width());
            prop_assert_eq!(digits.len(), kind.digit_width().max(value.to_string().len()));
        }
    }
}
