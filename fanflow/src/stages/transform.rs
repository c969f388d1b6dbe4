//! The transform stage: maps each input value and tags it with a branch label.

use super::{
    send_or_cancel, FanOutReceiver, RecvOutcome, SendOutcome, StageLife, StageRuntime,
    OUTPUT_CAPACITY,
};
use crate::cancellation::CancellationSignal;
use crate::context::BRANCH_LABEL;
use crate::errors::{FanflowError, Result};
use crate::events::ExitReason;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Label used when the signal carries no [`BRANCH_LABEL`].
pub const DEFAULT_LABEL: &str = "unlabeled";

/// The 26 lowercase latin letters.
pub const LATIN_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

/// A pure mapping applied by a transform stage.
pub trait Mapper<I, O>: Send + Sync + 'static {
    /// Maps one value.
    fn map(&self, input: I) -> O;
}

impl<I, O, F> Mapper<I, O> for F
where
    F: Fn(I) -> O + Send + Sync + 'static,
{
    fn map(&self, input: I) -> O {
        self(input)
    }
}

/// Maps an index to a symbol of a non-empty alphabet, wrapping around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: Arc<[char]>,
}

impl Alphabet {
    /// Creates an alphabet from the characters of `symbols`.
    pub fn new(symbols: &str) -> Result<Self> {
        let symbols: Arc<[char]> = symbols.chars().collect();
        if symbols.is_empty() {
            return Err(FanflowError::invalid_config("alphabet must not be empty"));
        }
        Ok(Self { symbols })
    }

    /// The lowercase latin alphabet.
    #[must_use]
    pub fn latin() -> Self {
        Self {
            symbols: LATIN_ALPHABET.chars().collect(),
        }
    }

    /// Number of symbols. Never zero.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns true if the alphabet has no symbols.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Returns the symbol for `index`.
    #[must_use]
    pub fn symbol(&self, index: usize) -> char {
        self.symbols[index % self.symbols.len()]
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::latin()
    }
}

impl Mapper<usize, char> for Alphabet {
    fn map(&self, input: usize) -> char {
        self.symbol(input)
    }
}

/// A value tagged with the label of the branch that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Labeled<T> {
    /// Branch label.
    pub label: Arc<str>,
    /// Mapped value.
    pub value: T,
}

impl<T> Labeled<T> {
    /// Creates a labeled value.
    pub fn new(label: impl Into<Arc<str>>, value: T) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }

    /// Returns the label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<T: fmt::Display> fmt::Display for Labeled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.value)
    }
}

/// Starts a transform stage reading from `input`.
///
/// The branch label comes from the signal's [`BRANCH_LABEL`] value. Several
/// transforms may share one `input`; each value is taken by exactly one of
/// them. The stage never closes `input`, it only drops its handle.
pub fn transform<I, O, M>(
    rt: &StageRuntime,
    signal: &CancellationSignal,
    input: FanOutReceiver<I>,
    mapper: Arc<M>,
) -> mpsc::Receiver<Labeled<O>>
where
    I: Send + 'static,
    O: Send + 'static,
    M: Mapper<I, O> + ?Sized,
{
    let label: Arc<str> = signal
        .value(&BRANCH_LABEL)
        .map_or(DEFAULT_LABEL, String::as_str)
        .into();
    let name = format!("transform:{label}");
    let (tx, rx) = mpsc::channel(OUTPUT_CAPACITY);
    let signal = signal.clone();
    let sink = rt.sink();

    rt.spawn(name.clone(), async move {
        let mut life = StageLife::start(name, sink);

        let reason = loop {
            let value = match input.recv_or_cancel(&signal).await {
                RecvOutcome::Item(value) => value,
                RecvOutcome::Exhausted => break ExitReason::InputExhausted,
                RecvOutcome::Cancelled => break ExitReason::Cancelled,
            };

            let mapped = Labeled {
                label: label.clone(),
                value: mapper.map(value),
            };
            match send_or_cancel(&tx, mapped, &signal).await {
                SendOutcome::Delivered => life.record_emit(),
                SendOutcome::Cancelled => break ExitReason::Cancelled,
                SendOutcome::Disconnected => break ExitReason::DownstreamClosed,
            }
        };

        drop(input);
        life.finish(reason, tx);
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn labeled(signal: &CancellationSignal, label: &str) -> CancellationSignal {
        signal.with_value(&BRANCH_LABEL, label.to_string())
    }

    #[test]
    fn test_alphabet_wraps() {
        let alphabet = Alphabet::new("abc").unwrap();
        assert_eq!(alphabet.len(), 3);
        assert_eq!(alphabet.map(0), 'a');
        assert_eq!(alphabet.map(4), 'b');
        assert_eq!(Alphabet::latin().symbol(25), 'z');
    }

    #[test]
    fn test_empty_alphabet_rejected() {
        assert!(Alphabet::new("").is_err());
    }

    #[test]
    fn test_labeled_display() {
        assert_eq!(Labeled::new("w1", 'z').to_string(), "w1: z");
    }

    #[tokio::test]
    async fn test_maps_until_input_exhausted() {
        let sink = Arc::new(CollectingEventSink::new());
        let rt = StageRuntime::new(sink.clone());
        let signal = CancellationSignal::new();
        let (tx, rx) = mpsc::channel::<usize>(OUTPUT_CAPACITY);

        let mut out = transform(
            &rt,
            &labeled(&signal, "w1"),
            FanOutReceiver::new(rx),
            Arc::new(Alphabet::latin()),
        );

        tokio::spawn(async move {
            for i in [0, 1, 25] {
                tx.send(i).await.unwrap();
            }
        });

        let mut seen = Vec::new();
        while let Some(v) = out.recv().await {
            seen.push(v.to_string());
        }
        assert_eq!(seen, vec!["w1: a", "w1: b", "w1: z"]);

        let report = rt.drain(Duration::from_secs(1)).await;
        assert!(report.is_clean());
        assert_eq!(
            sink.exit_reason("transform:w1"),
            Some(ExitReason::InputExhausted)
        );
        assert_eq!(sink.closed_count("transform:w1"), 1);
    }

    #[tokio::test]
    async fn test_unlabeled_signal_uses_default_label() {
        let rt = StageRuntime::default();
        let signal = CancellationSignal::new();
        let (tx, rx) = mpsc::channel::<usize>(OUTPUT_CAPACITY);
        let mut out = transform(&rt, &signal, FanOutReceiver::new(rx), Arc::new(|i: usize| i * 2));

        tx.send(21).await.unwrap();
        let v = out.recv().await.unwrap();
        assert_eq!(v.label(), DEFAULT_LABEL);
        assert_eq!(v.value, 42);
        signal.cancel("done");
    }

    #[tokio::test]
    async fn test_cancel_stops_transform_without_closing_input() {
        let sink = Arc::new(CollectingEventSink::new());
        let rt = StageRuntime::new(sink.clone());
        let signal = CancellationSignal::new();
        let (tx, rx) = mpsc::channel::<usize>(OUTPUT_CAPACITY);

        let _out = transform(
            &rt,
            &labeled(&signal, "w2"),
            FanOutReceiver::new(rx),
            Arc::new(Alphabet::latin()),
        );

        signal.cancel("stop");
        let report = rt.drain(Duration::from_secs(1)).await;
        assert!(report.is_clean());

        // The producer still owns its side; only the receiver handle is gone.
        assert!(tx.is_closed());
        assert_eq!(sink.exit_reason("transform:w2"), Some(ExitReason::Cancelled));
        assert_eq!(sink.closed_count("transform:w2"), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shared_input_split_between_branches() {
        let rt = StageRuntime::default();
        let signal = CancellationSignal::new();
        let (tx, rx) = mpsc::channel::<usize>(OUTPUT_CAPACITY);
        let shared = FanOutReceiver::new(rx);
        let mapper = Arc::new(|i: usize| i);

        let mut w1 = transform(&rt, &labeled(&signal, "w1"), shared.clone(), mapper.clone());
        let mut w2 = transform(&rt, &labeled(&signal, "w2"), shared, mapper);

        tokio::spawn(async move {
            for i in 0..200 {
                tx.send(i).await.unwrap();
            }
        });

        let (a, b) = tokio::join!(
            async {
                let mut v = Vec::new();
                while let Some(x) = w1.recv().await {
                    v.push(x.value);
                }
                v
            },
            async {
                let mut v = Vec::new();
                while let Some(x) = w2.recv().await {
                    v.push(x.value);
                }
                v
            }
        );

        // Each branch preserves the order it received values in.
        assert!(a.windows(2).all(|w| w[0] < w[1]));
        assert!(b.windows(2).all(|w| w[0] < w[1]));

        let mut all: Vec<_> = a.into_iter().chain(b).collect();
        all.sort_unstable();
        assert_eq!(all, (0..200).collect::<Vec<_>>());
    }
}
