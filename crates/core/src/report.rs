use pdfchat_extractor::TextSegment;

use crate::error::Error;

/// The outcome of [`crate::Driver::submit_turn`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnReport {
    /// The input was dropped without touching the mirror or the store.
    Rejected(RejectReason),
    /// The turn replayed the pending segments, one cycle each.
    SegmentReplay(BatchReport),
    /// The turn sent the input alone.
    SingleTurn(Result<(), Error>),
    /// The turn task ended before it could report, e.g. because the
    /// driver was shut down mid-turn.
    Aborted,
}

impl TurnReport {
    /// Returns `true` if the turn was accepted and every step succeeded.
    pub fn is_success(&self) -> bool {
        match self {
            TurnReport::SegmentReplay(batch) => batch.is_success(),
            TurnReport::SingleTurn(result) => result.is_ok(),
            TurnReport::Rejected(_) | TurnReport::Aborted => false,
        }
    }

    /// Iterates over every error recorded by the turn.
    pub fn errors(&self) -> impl Iterator<Item = &Error> {
        let (cycles, single) = match self {
            TurnReport::SegmentReplay(batch) => (batch.cycles.as_slice(), None),
            TurnReport::SingleTurn(Err(err)) => (&[][..], Some(err)),
            _ => (&[][..], None),
        };
        cycles
            .iter()
            .filter_map(|cycle| cycle.result.as_ref().err())
            .chain(single)
    }
}

/// Why a submission was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// The input was empty or whitespace only.
    EmptyInput,
    /// Another turn is still in flight.
    Busy,
    /// The driver is no longer running.
    Stopped,
}

/// The per-segment outcomes of a replay turn.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// One entry per pending segment, in segment order.
    pub cycles: Vec<CycleReport>,
    pub(crate) generation: u64,
}

impl BatchReport {
    /// Returns `true` if every cycle succeeded.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.cycles.iter().all(|cycle| cycle.result.is_ok())
    }

    /// Returns the number of cycles that failed.
    #[inline]
    pub fn failures(&self) -> usize {
        self.cycles.iter().filter(|cycle| cycle.result.is_err()).count()
    }
}

/// The outcome of one request/response/persist cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleReport {
    /// Position of the segment in the batch.
    pub index: usize,
    /// The segment the cycle was built from.
    pub segment: TextSegment,
    /// `Err` carries the first failure, which ended the cycle.
    pub result: Result<(), Error>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_report_errors() {
        let report = TurnReport::SegmentReplay(BatchReport {
            cycles: vec![
                CycleReport {
                    index: 0,
                    segment: TextSegment::new("a"),
                    result: Ok(()),
                },
                CycleReport {
                    index: 1,
                    segment: TextSegment::new("b"),
                    result: Err(Error::model_unavailable()),
                },
            ],
            generation: 1,
        });
        assert!(!report.is_success());
        assert_eq!(report.errors().count(), 1);

        let report = TurnReport::SingleTurn(Err(Error::store_append_failed()));
        assert_eq!(report.errors().count(), 1);
        assert!(TurnReport::SingleTurn(Ok(())).is_success());
        assert!(!TurnReport::Rejected(RejectReason::Busy).is_success());
    }
}
