/// Defines the window that an aggregation was calculated over.
///
/// The discriminants are the OTLP `AggregationTemporality` enum values, so
/// the variant can be cast directly when the model is serialized.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
#[non_exhaustive]
pub enum Temporality {
    /// A measurement interval that continues to stretch forward until an
    /// event ends the stream. Aggregation state is not reset between
    /// collections, so each data point covers everything recorded since the
    /// stream started.
    #[default]
    Cumulative = 2,

    /// A measurement interval that resets each cycle.
    ///
    /// Streams currently keep their state across collections; a `Delta`
    /// stream carries the same values as a `Cumulative` one and differs only
    /// in the reported temporality.
    Delta = 1,
}

impl Temporality {
    /// The OTLP wire value for this temporality.
    pub fn otlp_value(&self) -> i32 {
        *self as i32
    }
}

#[cfg(test)]
mod tests {
    use super::Temporality;

    #[test]
    fn otlp_discriminants() {
        assert_eq!(Temporality::Delta.otlp_value(), 1);
        assert_eq!(Temporality::Cumulative.otlp_value(), 2);
        assert_eq!(Temporality::default(), Temporality::Cumulative);
    }
}
