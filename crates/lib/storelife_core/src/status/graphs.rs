//! Static transition tables, one per entity type.
//!
//! The first status listed in `statuses` is the initial status for newly
//! created records.

use super::TransitionTable;

pub(super) static PREPARATION_PROJECT: TransitionTable = TransitionTable {
    statuses: &[
        "DRAFT",
        "PLANNING",
        "IN_PROGRESS",
        "PAUSED",
        "COMPLETED",
        "CANCELLED",
    ],
    edges: &[
        ("DRAFT", "PLANNING"),
        ("DRAFT", "PAUSED"),
        ("DRAFT", "CANCELLED"),
        ("PLANNING", "IN_PROGRESS"),
        ("PLANNING", "PAUSED"),
        ("PLANNING", "CANCELLED"),
        ("IN_PROGRESS", "COMPLETED"),
        ("IN_PROGRESS", "PAUSED"),
        ("IN_PROGRESS", "CANCELLED"),
        ("PAUSED", "DRAFT"),
        ("PAUSED", "PLANNING"),
        ("PAUSED", "IN_PROGRESS"),
        ("PAUSED", "CANCELLED"),
    ],
};

pub(super) static ENGINEERING_TASK: TransitionTable = TransitionTable {
    statuses: &[
        "PENDING",
        "IN_PROGRESS",
        "DELAYED",
        "COMPLETED",
        "ACCEPTED",
        "CANCELLED",
    ],
    edges: &[
        ("PENDING", "IN_PROGRESS"),
        ("PENDING", "CANCELLED"),
        ("IN_PROGRESS", "COMPLETED"),
        ("IN_PROGRESS", "DELAYED"),
        ("IN_PROGRESS", "CANCELLED"),
        ("DELAYED", "IN_PROGRESS"),
        ("DELAYED", "CANCELLED"),
        // rework after a failed acceptance check
        ("COMPLETED", "IN_PROGRESS"),
        ("COMPLETED", "ACCEPTED"),
    ],
};

pub(super) static EQUIPMENT_PROCUREMENT: TransitionTable = TransitionTable {
    statuses: &[
        "PENDING",
        "ORDERED",
        "SHIPPED",
        "DELIVERED",
        "INSTALLED",
        "CANCELLED",
    ],
    edges: &[
        ("PENDING", "ORDERED"),
        ("PENDING", "CANCELLED"),
        ("ORDERED", "SHIPPED"),
        ("ORDERED", "CANCELLED"),
        ("SHIPPED", "DELIVERED"),
        ("DELIVERED", "INSTALLED"),
    ],
};

pub(super) static LICENSE_APPLICATION: TransitionTable = TransitionTable {
    statuses: &[
        "PENDING",
        "SUBMITTED",
        "APPROVED",
        "REJECTED",
        "EXPIRED",
        "CANCELLED",
    ],
    edges: &[
        ("PENDING", "SUBMITTED"),
        ("PENDING", "CANCELLED"),
        ("SUBMITTED", "APPROVED"),
        ("SUBMITTED", "REJECTED"),
        ("REJECTED", "SUBMITTED"),
        ("REJECTED", "CANCELLED"),
        ("APPROVED", "EXPIRED"),
    ],
};

pub(super) static STAFF_RECRUITMENT: TransitionTable = TransitionTable {
    statuses: &[
        "PLANNING",
        "RECRUITING",
        "INTERVIEWING",
        "HIRED",
        "ONBOARDED",
        "CANCELLED",
    ],
    edges: &[
        ("PLANNING", "RECRUITING"),
        ("PLANNING", "CANCELLED"),
        ("RECRUITING", "INTERVIEWING"),
        ("RECRUITING", "CANCELLED"),
        ("INTERVIEWING", "RECRUITING"),
        ("INTERVIEWING", "HIRED"),
        ("INTERVIEWING", "CANCELLED"),
        ("HIRED", "ONBOARDED"),
    ],
};

pub(super) static MILESTONE: TransitionTable = TransitionTable {
    statuses: &["PENDING", "IN_PROGRESS", "DELAYED", "COMPLETED", "CANCELLED"],
    edges: &[
        ("PENDING", "IN_PROGRESS"),
        ("PENDING", "CANCELLED"),
        ("IN_PROGRESS", "COMPLETED"),
        ("IN_PROGRESS", "DELAYED"),
        ("DELAYED", "IN_PROGRESS"),
        ("DELAYED", "COMPLETED"),
    ],
};
