use time::{Duration, OffsetDateTime};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Timestamp(pub OffsetDateTime);

impl Timestamp {
    pub fn now_utc() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Time elapsed from `self` until `later`, zero if `later` is earlier.
    pub fn until(&self, later: Timestamp) -> Duration {
        (later.0 - self.0).max(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::UtcOffset;

    #[test]
    fn given_now_utc_when_called_should_carry_utc_offset() {
        assert_eq!(Timestamp::now_utc().0.offset(), UtcOffset::UTC);
    }

    #[test]
    fn given_earlier_target_when_until_should_clamp_to_zero() {
        let now = Timestamp::now_utc();
        let earlier = Timestamp(now.0 - Duration::seconds(5));
        assert_eq!(now.until(earlier), Duration::ZERO);
        assert_eq!(earlier.until(now), Duration::seconds(5));
    }
}
