//! Named tidal constituents and their angular speeds.
//!
//! Each constituent is identified by its Darwin symbol and carries its
//! speed in degrees per hour, the unit used in published tables. The
//! pulsation fed to the solver is the same speed in radians per hour:
//!
//! ```text
//! ω = speed · π / 180
//! ```
//!
//! A [`ConstituentTable`] is built once and handed to the analysis by
//! reference; nothing mutates it afterwards.

use std::f64::consts::PI;

use thiserror::Error;

/// Name of the zero-frequency (mean level) term.
pub const MEAN_TERM: &str = "Z0";

/// Error type for constituent table lookups.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConstituentError {
    /// Name not present in the table
    #[error("Unknown constituent: {0}")]
    Unknown(String),

    /// Same name given twice when building a table
    #[error("Duplicate constituent: {0}")]
    Duplicate(String),

    /// Speed that cannot be turned into a pulsation
    #[error("Invalid speed for {name}: {speed} deg/h")]
    InvalidSpeed { name: String, speed: f64 },
}

/// A single harmonic constituent.
#[derive(Clone, Debug, PartialEq)]
pub struct Constituent {
    /// Symbol (e.g., "M2", "K1", "Z0")
    pub name: String,
    /// Angular speed in degrees per hour
    pub speed: f64,
}

impl Constituent {
    /// Create a new constituent from a name and a speed in degrees/hour.
    pub fn new(name: impl Into<String>, speed: f64) -> Self {
        Self {
            name: name.into(),
            speed,
        }
    }

    /// Angular frequency in rad/h.
    pub fn pulsation(&self) -> f64 {
        self.speed * PI / 180.0
    }

    /// Period in hours, infinite for the mean term.
    pub fn period_hours(&self) -> f64 {
        if self.speed == 0.0 {
            f64::INFINITY
        } else {
            360.0 / self.speed
        }
    }

    /// Whether this is the zero-frequency term.
    pub fn is_mean_term(&self) -> bool {
        self.speed == 0.0
    }

    /// Principal lunar semidiurnal (M2).
    ///
    /// Period ≈ 12.42 hours, dominant in most locations.
    pub fn m2() -> Self {
        Self::new("M2", 28.984_104_2)
    }

    /// Principal solar semidiurnal (S2).
    pub fn s2() -> Self {
        Self::new("S2", 30.0)
    }

    /// Larger lunar elliptic semidiurnal (N2).
    pub fn n2() -> Self {
        Self::new("N2", 28.439_729_5)
    }

    /// Lunisolar diurnal (K1).
    pub fn k1() -> Self {
        Self::new("K1", 15.041_068_6)
    }

    /// Principal lunar diurnal (O1).
    pub fn o1() -> Self {
        Self::new("O1", 13.943_035_6)
    }

    /// Principal solar diurnal (P1).
    pub fn p1() -> Self {
        Self::new("P1", 14.958_931_4)
    }

    /// Zero-frequency mean level term.
    pub fn z0() -> Self {
        Self::new(MEAN_TERM, 0.0)
    }
}

/// Ordered, immutable set of constituents.
///
/// Order is significant: it fixes the positional correspondence between
/// [`ConstituentTable::pulsations`] and the amplitude/phase arrays the
/// solver returns.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstituentTable {
    constituents: Vec<Constituent>,
}

impl ConstituentTable {
    /// Build a table, rejecting duplicate names and negative or non-finite speeds.
    pub fn new(constituents: Vec<Constituent>) -> Result<Self, ConstituentError> {
        for (i, c) in constituents.iter().enumerate() {
            if !c.speed.is_finite() || c.speed < 0.0 {
                return Err(ConstituentError::InvalidSpeed {
                    name: c.name.clone(),
                    speed: c.speed,
                });
            }
            if constituents[..i].iter().any(|other| other.name == c.name) {
                return Err(ConstituentError::Duplicate(c.name.clone()));
            }
        }
        Ok(Self { constituents })
    }

    /// The fourteen main astronomical constituents followed by the mean term.
    pub fn standard() -> Self {
        let constituents = [
            ("M2", 28.984_104_2),  // Principal lunar semidiurnal
            ("S2", 30.000_000_0),  // Principal solar semidiurnal
            ("N2", 28.439_729_5),  // Larger lunar elliptic semidiurnal
            ("K1", 15.041_068_6),  // Lunisolar diurnal
            ("O1", 13.943_035_6),  // Principal lunar diurnal
            ("P1", 14.958_931_4),  // Principal solar diurnal
            ("Q1", 13.398_660_9),  // Larger lunar elliptic diurnal
            ("K2", 30.082_137_3),  // Lunisolar semidiurnal
            ("L2", 29.528_478_9),  // Smaller lunar elliptic semidiurnal
            ("T2", 29.958_933_3),  // Larger solar elliptic semidiurnal
            ("Mf", 1.098_033_1),   // Lunar fortnightly
            ("Mm", 0.544_374_7),   // Lunar monthly
            ("Ssa", 0.082_137_3),  // Solar semiannual
            ("Sa", 0.041_068_6),   // Solar annual
            (MEAN_TERM, 0.0),
        ]
        .into_iter()
        .map(|(name, speed)| Constituent::new(name, speed))
        .collect();

        Self { constituents }
    }

    /// Semidiurnal and diurnal principal constituents (M2, S2, K1, O1).
    pub fn principal() -> Self {
        Self {
            constituents: vec![
                Constituent::m2(),
                Constituent::s2(),
                Constituent::k1(),
                Constituent::o1(),
            ],
        }
    }

    /// Sub-table with the named constituents, in the order given.
    pub fn select(&self, names: &[&str]) -> Result<Self, ConstituentError> {
        let constituents = names
            .iter()
            .map(|&name| {
                self.get(name)
                    .cloned()
                    .ok_or_else(|| ConstituentError::Unknown(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(constituents)
    }

    /// Copy of this table with the mean term appended (no-op if present).
    pub fn with_mean_term(&self) -> Self {
        let mut constituents = self.constituents.clone();
        if !constituents.iter().any(Constituent::is_mean_term) {
            constituents.push(Constituent::z0());
        }
        Self { constituents }
    }

    /// Copy of this table without any zero-frequency term.
    pub fn without_mean_term(&self) -> Self {
        Self {
            constituents: self
                .constituents
                .iter()
                .filter(|c| !c.is_mean_term())
                .cloned()
                .collect(),
        }
    }

    /// Find a constituent by name (case-sensitive: `Mm` and `MM` differ in tables).
    pub fn get(&self, name: &str) -> Option<&Constituent> {
        self.constituents.iter().find(|c| c.name == name)
    }

    /// Position of a constituent in the table.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.constituents.iter().position(|c| c.name == name)
    }

    /// Constituent names in table order.
    pub fn names(&self) -> Vec<&str> {
        self.constituents.iter().map(|c| c.name.as_str()).collect()
    }

    /// Pulsations in rad/h, in table order.
    pub fn pulsations(&self) -> Vec<f64> {
        self.constituents.iter().map(Constituent::pulsation).collect()
    }

    /// Iterate over the constituents.
    pub fn iter(&self) -> std::slice::Iter<'_, Constituent> {
        self.constituents.iter()
    }

    /// Number of constituents.
    pub fn len(&self) -> usize {
        self.constituents.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.constituents.is_empty()
    }

    /// Minimum record length (hours) to separate every constituent pair.
    ///
    /// Rayleigh criterion: two constituents with frequencies f₁ and f₂
    /// (cycles/hour) need a record of at least 1 / |f₁ - f₂|.
    pub fn minimum_record_length(&self) -> f64 {
        let freqs: Vec<f64> = self.constituents.iter().map(|c| c.speed / 360.0).collect();
        let mut min_length = 0.0;

        for i in 0..freqs.len() {
            for j in (i + 1)..freqs.len() {
                let df = (freqs[i] - freqs[j]).abs();
                if df > 1e-12 {
                    let length = 1.0 / df;
                    if length > min_length {
                        min_length = length;
                    }
                }
            }
        }

        min_length
    }
}

impl<'a> IntoIterator for &'a ConstituentTable {
    type Item = &'a Constituent;
    type IntoIter = std::slice::Iter<'a, Constituent>;

    fn into_iter(self) -> Self::IntoIter {
        self.constituents.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-6;

    #[test]
    fn test_m2_pulsation() {
        // M2 ≈ 0.505868 rad/h
        let m2 = Constituent::m2();
        assert!((m2.pulsation() - 0.505_868).abs() < TOL);
        assert!((m2.period_hours() - 12.42).abs() < 0.01);
    }

    #[test]
    fn test_standard_table() {
        let table = ConstituentTable::standard();
        assert_eq!(table.len(), 15);
        assert_eq!(table.names()[0], "M2");
        assert!(table.get(MEAN_TERM).unwrap().is_mean_term());
        assert!((table.get("S2").unwrap().pulsation() - 0.523_599).abs() < TOL);
    }

    #[test]
    fn test_select_preserves_order() {
        let table = ConstituentTable::standard();
        let sub = table.select(&["K1", "M2"]).unwrap();
        assert_eq!(sub.names(), vec!["K1", "M2"]);
        assert!((sub.pulsations()[1] - Constituent::m2().pulsation()).abs() < TOL);
    }

    #[test]
    fn test_select_unknown() {
        let table = ConstituentTable::standard();
        let result = table.select(&["M2", "X9"]);
        assert_eq!(result, Err(ConstituentError::Unknown("X9".into())));
    }

    #[test]
    fn test_duplicate_rejected() {
        let result = ConstituentTable::new(vec![Constituent::m2(), Constituent::m2()]);
        assert!(matches!(result, Err(ConstituentError::Duplicate(_))));
    }

    #[test]
    fn test_negative_speed_rejected() {
        let result = ConstituentTable::new(vec![Constituent::new("bad", -1.0)]);
        assert!(matches!(result, Err(ConstituentError::InvalidSpeed { .. })));
    }

    #[test]
    fn test_mean_term_toggle() {
        let table = ConstituentTable::principal();
        assert!(table.get(MEAN_TERM).is_none());

        let with = table.with_mean_term();
        assert_eq!(with.len(), 5);
        assert_eq!(with.with_mean_term().len(), 5);
        assert_eq!(with.without_mean_term(), table);
    }

    #[test]
    fn test_minimum_record_length() {
        let table = ConstituentTable::principal().select(&["M2", "S2"]).unwrap();
        // |1/12.42 - 1/12.00| cycles/hour → ≈ 355 hours
        let min_length = table.minimum_record_length();
        assert!(
            min_length > 300.0 && min_length < 400.0,
            "Minimum record length should be ~355 hours, got {}",
            min_length
        );
    }
}
