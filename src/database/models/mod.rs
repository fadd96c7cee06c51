pub mod budget_config;
pub mod category;
pub mod chat;
pub mod debt;
pub mod gamification;
pub mod pending_op;
pub mod saving_goal;
pub mod transaction;

pub use budget_config::{BudgetConfig, Law, Profile, SurplusRule};
pub use category::Category;
pub use chat::{ChatMessage, ChatRole, ChatSession};
pub use debt::Debt;
pub use gamification::{GamificationState, Streak};
pub use pending_op::{PendingOp, QueueStatus, QueuedOp};
pub use saving_goal::SavingsGoal;
pub use transaction::{Allocation, Transaction, TransactionKind};
