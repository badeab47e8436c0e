//! Domain model (IDs, commands, tasks, packets, results).

pub mod answer;
pub mod command;
pub mod ids;
pub mod object;
pub mod packet;
pub mod result;
pub mod target;
pub mod task;

pub use answer::{Answer, AnswerList, AnswerQuality, AnswerStatus};
pub use command::{Command, Operation, SubCommand, UnknownOperation, operation_name};
pub use ids::{RequestId, TaskId};
pub use object::{Filter, Object, ObjectList, Projection};
pub use packet::{
    AuthBlob, AuthContext, AuthParseError, Identity, Origin, PROTOCOL_VERSION, Packet, PacketKind,
};
pub use result::{MultiResult, TaskResult, to_multi_result};
pub use target::Target;
pub use task::{OwnershipMode, Task, TaskInputs};
