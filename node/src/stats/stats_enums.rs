use crate::{
    block_processing::BlockSource,
    consensus::{ElectionBehavior, ElectionState, ElectionStatusType},
};
use lattice_core::{BlockSubType, VoteCode, VoteSource};
use lattice_ledger::BlockStatus;
use serde::Serialize;
use serde_variant::to_variant_name;

/// Primary statistics type
#[repr(u8)]
#[derive(FromPrimitive, Serialize, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[serde(rename_all = "snake_case")]
pub enum StatType {
    Error,
    Message,
    Block,
    Ledger,
    Rollback,
    Vote,
    VoteProcessor,
    VoteProcessorOverfill,
    Election,
    ElectionCleanup,
    ElectionVote,
    ConfirmationHeight,
    ConfirmingSet,
    ConfirmationSolicitor,
    VoteGenerator,
    VoteCache,
    VoteCacheProcessor,
    Hinting,
    Blockprocessor,
    BlockprocessorSource,
    BlockprocessorResult,
    BlockprocessorOverfill,
    ActiveElections,
    ActiveElectionsStarted,
    ActiveElectionsStopped,
    ActiveElectionsConfirmed,
    ActiveElectionsDropped,
    ActiveElectionsTimeout,
    ActiveElectionsCemented,
    Backlog,
    ElectionScheduler,
    OptimisticScheduler,
    ManualScheduler,
    OnlineReps,
    Pruning,
    Drop,
}

impl StatType {
    pub fn as_str(&self) -> &'static str {
        to_variant_name(self).unwrap_or_default()
    }
}

/// Optional detail type
#[repr(u16)]
#[derive(FromPrimitive, Serialize, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[serde(rename_all = "snake_case")]
pub enum DetailType {
    // common
    All,
    Unknown,
    Ok,
    Loop,
    Total,
    Process,
    Processed,
    Insert,
    InsertFailed,
    Duplicate,
    Overfill,
    Erase,
    Trigger,
    Triggered,
    Queued,
    Full,
    Cleanup,

    // block subtypes
    Send,
    Receive,
    Open,
    Change,

    // block status
    Progress,
    Old,
    Fork,
    Unreceivable,
    GapPrevious,
    GapSource,
    OpenedBurnAccount,
    BalanceMismatch,
    BlockPosition,

    // message types
    Publish,
    ConfirmReq,
    ConfirmAck,

    // election behavior
    Manual,
    Priority,
    Hinted,
    Optimistic,

    // election state
    Passive,
    Active,
    Confirmed,
    ExpiredConfirmed,
    ExpiredUnconfirmed,

    // vote code
    Vote,
    Replay,
    Invalid,
    Indeterminate,
    Ignored,

    // vote source
    Live,
    Rebroadcast,
    Cache,

    // block source
    Local,
    Forced,

    // election
    VoteNew,
    VoteCached,
    ConfirmOnce,
    ConfirmOnceFailed,
    GenerateVote,
    GenerateVoteNormal,
    GenerateVoteFinal,
    BroadcastVote,
    BroadcastBlockInitial,
    BroadcastBlockRepeat,
    ConfirmationRequest,
    WinnerChanged,
    ForceConfirmed,
    ElectionBlockConflict,

    // election status type
    ActiveQuorum,
    ActiveConfirmationHeight,
    Inactive,

    // active elections
    Started,
    Evicted,
    RecentlyConfirmed,
    CapacityExceeded,
    Stopped,
    Timeout,

    // vote processor
    VoteValid,
    VoteInvalid,
    VoteReplay,
    VoteIndeterminate,
    VoteIgnored,

    // vote generator
    GeneratorBroadcasts,
    GeneratorReplies,
    GeneratorRepliesDiscarded,
    GeneratorSpacing,
    GeneratorVotes,
    ShouldVote,
    ShouldNotVote,
    FinalVoteConflict,
    DependentsUnconfirmed,

    // vote cache
    Update,
    Top,
    Activated,
    MissingBlock,
    DependentUnconfirmed,
    AlreadyConfirmed,

    // election scheduler
    ActivateSkip,
    ActivateFailed,
    ActivateFull,

    // confirming set
    Cemented,
    CementingFailed,
    AlreadyCemented,
    NotifyCemented,
    NotifyAlreadyCemented,
    BlocksConfirmed,
    Cooldown,

    // block processor
    Rollback,
    RollbackFailed,
    CommitFailed,

    // pruning
    Pruned,
    PruningBatch,

    // online reps
    RepNew,
    Sample,
}

impl DetailType {
    pub fn as_str(&self) -> &'static str {
        to_variant_name(self).unwrap_or_default()
    }
}

/// Direction of the stat. If the direction is irrelevant, use In
#[derive(FromPrimitive, PartialEq, PartialOrd, Eq, Ord, Clone, Copy, Debug)]
#[repr(u8)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

#[repr(u8)]
#[derive(FromPrimitive, Serialize, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[serde(rename_all = "snake_case")]
pub enum Sample {
    ActiveElectionDuration,
    CementingBatchSize,
    BlockProcessingBatchSize,
}

impl Sample {
    pub fn as_str(&self) -> &'static str {
        to_variant_name(self).unwrap_or_default()
    }
}

impl From<BlockSubType> for DetailType {
    fn from(subtype: BlockSubType) -> Self {
        match subtype {
            BlockSubType::Send => DetailType::Send,
            BlockSubType::Receive => DetailType::Receive,
            BlockSubType::Open => DetailType::Open,
            BlockSubType::Change => DetailType::Change,
        }
    }
}

impl From<BlockStatus> for DetailType {
    fn from(status: BlockStatus) -> Self {
        match status {
            BlockStatus::Progress => DetailType::Progress,
            BlockStatus::Old => DetailType::Old,
            BlockStatus::Fork => DetailType::Fork,
            BlockStatus::Unreceivable => DetailType::Unreceivable,
            BlockStatus::GapPrevious => DetailType::GapPrevious,
            BlockStatus::GapSource => DetailType::GapSource,
            BlockStatus::OpenedBurnAccount => DetailType::OpenedBurnAccount,
            BlockStatus::BalanceMismatch => DetailType::BalanceMismatch,
            BlockStatus::BlockPosition => DetailType::BlockPosition,
        }
    }
}

impl From<VoteCode> for DetailType {
    fn from(code: VoteCode) -> Self {
        match code {
            VoteCode::Vote => DetailType::Vote,
            VoteCode::Replay => DetailType::Replay,
            VoteCode::Invalid => DetailType::Invalid,
            VoteCode::Indeterminate => DetailType::Indeterminate,
            VoteCode::Ignored => DetailType::Ignored,
        }
    }
}

impl From<VoteSource> for DetailType {
    fn from(source: VoteSource) -> Self {
        match source {
            VoteSource::Live => DetailType::Live,
            VoteSource::Rebroadcast => DetailType::Rebroadcast,
            VoteSource::Cache => DetailType::Cache,
        }
    }
}

impl From<BlockSource> for DetailType {
    fn from(source: BlockSource) -> Self {
        match source {
            BlockSource::Live => DetailType::Live,
            BlockSource::Local => DetailType::Local,
            BlockSource::Forced => DetailType::Forced,
        }
    }
}

impl From<ElectionBehavior> for DetailType {
    fn from(behavior: ElectionBehavior) -> Self {
        match behavior {
            ElectionBehavior::Manual => DetailType::Manual,
            ElectionBehavior::Priority => DetailType::Priority,
            ElectionBehavior::Hinted => DetailType::Hinted,
            ElectionBehavior::Optimistic => DetailType::Optimistic,
        }
    }
}

impl From<ElectionState> for DetailType {
    fn from(state: ElectionState) -> Self {
        match state {
            ElectionState::Passive => DetailType::Passive,
            ElectionState::Active => DetailType::Active,
            ElectionState::Confirmed => DetailType::Confirmed,
            ElectionState::ExpiredConfirmed => DetailType::ExpiredConfirmed,
            ElectionState::ExpiredUnconfirmed => DetailType::ExpiredUnconfirmed,
        }
    }
}

impl From<ElectionStatusType> for DetailType {
    fn from(status_type: ElectionStatusType) -> Self {
        match status_type {
            ElectionStatusType::Ongoing => DetailType::Unknown,
            ElectionStatusType::ActiveConfirmedQuorum => DetailType::ActiveQuorum,
            ElectionStatusType::ActiveConfirmationHeight => DetailType::ActiveConfirmationHeight,
            ElectionStatusType::InactiveConfirmationHeight => DetailType::Inactive,
            ElectionStatusType::Stopped => DetailType::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_snake_case() {
        assert_eq!(StatType::ActiveElectionsStarted.as_str(), "active_elections_started");
        assert_eq!(DetailType::CementingFailed.as_str(), "cementing_failed");
        assert_eq!(Sample::ActiveElectionDuration.as_str(), "active_election_duration");
    }

    #[test]
    fn block_status_detail() {
        assert_eq!(
            DetailType::from(BlockStatus::GapPrevious).as_str(),
            BlockStatus::GapPrevious.as_str()
        );
    }
}
