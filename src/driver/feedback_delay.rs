use std::marker::PhantomData;
use std::time::Duration;
use crate::util::random::{Random, RngRandom};

/// A policy deciding when to send feedback (i.e. NAKs) for a gap: either immediately when the
///  gap is detected, and / or after a delay (which is also the interval for repeating it)
#[cfg_attr(test, mockall::automock)]
pub trait FeedbackDelayGenerator: Send {
    fn generate_delay(&self) -> Duration;

    fn should_feedback_immediately(&self) -> bool;
}

/// Fixed delay - appropriate for unicast where there is only a single receiver that can NAK
#[derive(Clone, Debug)]
pub struct StaticDelayGenerator {
    delay: Duration,
    immediate_feedback: bool,
}
impl StaticDelayGenerator {
    pub fn new(delay: Duration, immediate_feedback: bool) -> StaticDelayGenerator {
        StaticDelayGenerator {
            delay,
            immediate_feedback,
        }
    }
}
impl FeedbackDelayGenerator for StaticDelayGenerator {
    fn generate_delay(&self) -> Duration {
        self.delay
    }

    fn should_feedback_immediately(&self) -> bool {
        self.immediate_feedback
    }
}

/// Randomized delay for multicast: when a packet is lost, it is typically lost for many receivers
///  at once, and it is sufficient for one of them to NAK. Random delays give the receiver with the
///  shortest delay a chance to NAK first, and the others suppress their NAKs when they see it.
///
/// Delays follow a truncated exponential distribution over `0..max_backoff`, which minimizes the
///  expected number of redundant NAKs for a given group size:
///
/// ```ascii
/// lambda = ln(group size) + 1
/// delay  = max_backoff / lambda * ln(1 + (e^lambda - 1) * u)      u uniform in [0, 1)
/// ```
///
/// NAKs are never sent immediately, since that would defeat suppression.
pub struct OptimalMulticastDelayGenerator<R: Random = RngRandom> {
    max_backoff: Duration,
    lambda: f64,
    factor: f64,
    _random: PhantomData<R>,
}
impl OptimalMulticastDelayGenerator {
    pub fn new(max_backoff: Duration, group_size: u32) -> OptimalMulticastDelayGenerator {
        Self::new_with_random(max_backoff, group_size)
    }
}
impl<R: Random> OptimalMulticastDelayGenerator<R> {
    pub fn new_with_random(max_backoff: Duration, group_size: u32) -> OptimalMulticastDelayGenerator<R> {
        let lambda = (group_size.max(1) as f64).ln() + 1.0;
        OptimalMulticastDelayGenerator {
            max_backoff,
            lambda,
            factor: lambda.exp() - 1.0,
            _random: Default::default(),
        }
    }
}
impl<R: Random + Send> FeedbackDelayGenerator for OptimalMulticastDelayGenerator<R> {
    fn generate_delay(&self) -> Duration {
        let u = R::gen_f64_range(0.0..1.0);
        let fraction = (1.0 + self.factor * u).ln() / self.lambda;
        self.max_backoff.mul_f64(fraction.clamp(0.0, 1.0))
    }

    fn should_feedback_immediately(&self) -> bool {
        false
    }
}

/// The effective feedback policy of a receiver, see [crate::config::DriverConfig::delay_generator]
pub enum DelayGenerator {
    Static(StaticDelayGenerator),
    OptimalMulticast(OptimalMulticastDelayGenerator),
}
impl FeedbackDelayGenerator for DelayGenerator {
    fn generate_delay(&self) -> Duration {
        match self {
            DelayGenerator::Static(g) => g.generate_delay(),
            DelayGenerator::OptimalMulticast(g) => g.generate_delay(),
        }
    }

    fn should_feedback_immediately(&self) -> bool {
        match self {
            DelayGenerator::Static(g) => g.should_feedback_immediately(),
            DelayGenerator::OptimalMulticast(g) => g.should_feedback_immediately(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::random::{MockRandom, MOCK_RANDOM_MUTEX};
    use rstest::rstest;

    #[rstest]
    #[case(Duration::from_millis(20), false)]
    #[case(Duration::from_millis(60), true)]
    fn test_static(#[case] delay: Duration, #[case] immediate: bool) {
        let generator = StaticDelayGenerator::new(delay, immediate);
        assert_eq!(generator.generate_delay(), delay);
        assert_eq!(generator.should_feedback_immediately(), immediate);
    }

    #[rstest]
    #[case::zero(0.0, Duration::ZERO)]
    #[case::upper_end(0.999999999, Duration::from_millis(10))]
    fn test_optimal_multicast_bounds(#[case] u: f64, #[case] expected: Duration) {
        let _lock = MOCK_RANDOM_MUTEX.lock(); // automock expectations for static methods are global, so we avoid races by locking

        let ctx = MockRandom::gen_f64_range_context();
        ctx.expect()
            .returning(move |_| u);

        let generator = OptimalMulticastDelayGenerator::<MockRandom>::new_with_random(Duration::from_millis(10), 100);
        let delay = generator.generate_delay();

        let diff = delay.as_nanos().abs_diff(expected.as_nanos());
        assert!(diff < 1_000, "delay {:?} differs from {:?}", delay, expected);
        assert!(!generator.should_feedback_immediately());
    }

    #[test]
    fn test_optimal_multicast_is_skewed_towards_long_delays() {
        let _lock = MOCK_RANDOM_MUTEX.lock();

        let ctx = MockRandom::gen_f64_range_context();
        ctx.expect()
            .returning(|_| 0.5);

        // for a big group, the median delay is close to the maximum: only few receivers should
        //  NAK early
        let generator = OptimalMulticastDelayGenerator::<MockRandom>::new_with_random(Duration::from_millis(10), 1000);
        assert!(generator.generate_delay() > Duration::from_millis(8));
    }

    #[test]
    fn test_optimal_multicast_with_rng_stays_in_range() {
        let generator = OptimalMulticastDelayGenerator::new(Duration::from_millis(10), 10);
        for _ in 0..1000 {
            assert!(generator.generate_delay() <= Duration::from_millis(10));
        }
    }

    #[test]
    fn test_delay_generator_dispatch() {
        let generator = DelayGenerator::Static(StaticDelayGenerator::new(Duration::from_millis(5), true));
        assert_eq!(generator.generate_delay(), Duration::from_millis(5));
        assert!(generator.should_feedback_immediately());
    }
}
