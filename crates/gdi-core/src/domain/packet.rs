//! Packet - 1 往復分の GDI リクエスト
//!
//! Packet は 1 つ以上の Task を append 順に保持します。
//!
//! # ライフサイクル
//! - dispatch 前: 生成側（producer）だけが Task を append できる
//! - dispatch 後: 消費側（worker もしくは correlation）が結果を書き込む
//! - 最後に `MultiResult` へ変換され、そこで破棄される
//!
//! 同期用の状態（handled フラグ + Condvar）は Packet 自身ではなく
//! internal dispatch の handoff 側に持たせています（`app::handoff`）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::command::Command;
use super::ids::{RequestId, TaskId};
use super::target::Target;
use super::task::{OwnershipMode, Task, TaskInputs};

/// Protocol version stamped on every packet built by this crate.
pub const PROTOCOL_VERSION: u32 = 0x1000_0009;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketKind {
    #[default]
    GdiRequest,
}

/// Error returned when an auth blob cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed auth info: {0}")]
pub struct AuthParseError(String);

/// Who a request is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Identity {
    pub uid: u32,
    pub gid: u32,
    pub user: String,
    pub group: String,
    /// Supplementary group ids.
    pub groups: Vec<u32>,
}

impl Identity {
    /// Encode as an auth blob: `uid gid user group [g1,g2,...]`.
    pub fn to_auth_blob(&self) -> AuthBlob {
        let groups = self
            .groups
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let mut blob = format!("{} {} {} {}", self.uid, self.gid, self.user, self.group);
        if !groups.is_empty() {
            blob.push(' ');
            blob.push_str(&groups);
        }
        AuthBlob(blob)
    }

    pub fn parse(blob: &AuthBlob) -> Result<Self, AuthParseError> {
        let mut fields = blob.0.split_whitespace();
        let mut next = |name: &str| {
            fields
                .next()
                .ok_or_else(|| AuthParseError(format!("missing {name}")))
        };
        let uid = next("uid")?
            .parse()
            .map_err(|_| AuthParseError("uid is not a number".to_string()))?;
        let gid = next("gid")?
            .parse()
            .map_err(|_| AuthParseError("gid is not a number".to_string()))?;
        let user = next("user")?.to_string();
        let group = next("group")?.to_string();
        let groups = match fields.next() {
            Some(list) => list
                .split(',')
                .map(|g| {
                    g.parse()
                        .map_err(|_| AuthParseError(format!("bad group id '{g}'")))
                })
                .collect::<Result<Vec<u32>, _>>()?,
            None => Vec::new(),
        };
        Ok(Self {
            uid,
            gid,
            user,
            group,
            groups,
        })
    }
}

/// Opaque credential blob attached to a packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthBlob(String);

impl AuthBlob {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Addressing context of the requesting component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub host: String,
    pub component: String,
    pub component_id: u16,
    pub identity: Identity,
}

/// Addressing and credential metadata of a packet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Origin {
    pub host: String,
    pub component: String,
    pub component_id: u16,
    pub auth_info: Option<AuthBlob>,
    pub requested_at: Option<DateTime<Utc>>,
    /// Parsed from `auth_info` on the receiving side.
    #[serde(skip)]
    pub identity: Option<Identity>,
}

impl Origin {
    /// Parse `auth_info` into `identity`, replacing any earlier value.
    pub fn parse_identity(&mut self) -> Result<&Identity, AuthParseError> {
        let blob = self
            .auth_info
            .as_ref()
            .ok_or_else(|| AuthParseError("no auth info attached".to_string()))?;
        let identity = Identity::parse(blob)?;
        Ok(self.identity.insert(identity))
    }
}

/// One client request with its ordered tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    id: RequestId,
    kind: PacketKind,
    version: u32,
    origin: Origin,
    #[serde(skip)]
    internal: bool,
    tasks: Vec<Task>,
}

impl Packet {
    /// New packet without addressing information.
    pub fn create_base() -> Self {
        Self {
            id: RequestId::UNASSIGNED,
            kind: PacketKind::GdiRequest,
            version: PROTOCOL_VERSION,
            origin: Origin::default(),
            internal: false,
            tasks: Vec::new(),
        }
    }

    /// New packet with its origin filled in from `ctx`.
    pub fn create(ctx: &AuthContext, now: DateTime<Utc>) -> Self {
        let mut packet = Self::create_base();
        packet.attach_origin(ctx, now);
        packet
    }

    pub fn attach_origin(&mut self, ctx: &AuthContext, now: DateTime<Utc>) {
        self.origin.host = ctx.host.clone();
        self.origin.component = ctx.component.clone();
        self.origin.component_id = ctx.component_id;
        self.origin.auth_info = Some(ctx.identity.to_auth_blob());
        self.origin.requested_at = Some(now);
    }

    /// Append a task and return its id.
    ///
    /// Ids start at 1 and grow by one per append. Target and command are not
    /// validated here; that is up to the handler.
    pub fn append_task(
        &mut self,
        target: Target,
        command: Command,
        inputs: TaskInputs<'_>,
        mode: OwnershipMode,
    ) -> TaskId {
        let id = self.last_task_id().next();
        self.tasks
            .push(Task::create(id, target, command, inputs, mode));
        id
    }

    /// Id of the most recently appended task, or 0 for an empty packet.
    pub fn last_task_id(&self) -> TaskId {
        self.tasks
            .last()
            .map(Task::id)
            .unwrap_or(TaskId::UNASSIGNED)
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub(crate) fn assign_id(&mut self, id: RequestId) {
        self.id = id;
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn origin_mut(&mut self) -> &mut Origin {
        &mut self.origin
    }

    /// Was this packet issued from inside the master process?
    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub(crate) fn mark_internal(&mut self) {
        self.internal = true;
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn tasks_mut(&mut self) -> &mut [Task] {
        &mut self.tasks
    }

    /// Borrow the origin alongside the tasks, for handlers that need both.
    pub fn origin_and_tasks_mut(&mut self) -> (&Origin, &mut [Task]) {
        (&self.origin, &mut self.tasks)
    }

    pub fn first_task(&self) -> Option<&Task> {
        self.tasks.first()
    }

    pub fn first_task_mut(&mut self) -> Option<&mut Task> {
        self.tasks.first_mut()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Release the packet and every task it owns, in task order.
    pub fn destroy(self) {
        trace!(packet = %self.id, tasks = self.tasks.len(), "destroying packet");
        drop(self);
    }

    /// Dump the packet at trace level.
    pub fn trace_dump(&self) {
        trace!(
            packet = %self.id,
            host = %self.origin.host,
            component = %self.origin.component,
            auth_info = self.origin.auth_info.as_ref().map(AuthBlob::as_str).unwrap_or("<null>"),
            version = self.version,
            tasks = self.tasks.len(),
            "packet"
        );
        for task in &self.tasks {
            trace!(
                task = %task.id(),
                command = %task.command(),
                target = %task.target(),
                data = task.data().map(|d| d.len()),
                answers = task.answers().len(),
                filter = task.filter().is_some(),
                projection = task.projection().is_some(),
                "task"
            );
        }
    }
}
