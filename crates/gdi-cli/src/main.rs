//! gdi-cli - dispatch engine の demo
//!
//! プロセス内に master（handler + worker group）を立て、同じ master に
//! internal dispatch と external dispatch（loopback transport）の両方から
//! 要求を出して結果を表示します。
//!
//! 環境変数:
//! - `RUST_LOG`: ログレベル（デフォルト `info`）
//! - `GDI_PARAMS`: `gdi_retries=2,gdi_timeout=5,cl_ping=true` 形式のパラメータ

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gdi_core::app::{
    DEFAULT_POLL_INTERVAL, ExternalDispatch, GdiClient, HandlerError, HandlerRegistry,
    InternalDispatch, Runtime, TaskHandler, WorkerGroup,
};
use gdi_core::domain::{
    Answer, AnswerList, AnswerStatus, AuthContext, Command, Identity, MultiResult, Object,
    ObjectList, Operation, Origin, Projection, SubCommand, Target, Task, TaskInputs,
};
use gdi_core::impls::{
    InMemoryRequestQueue, JsonPacketCodec, LoopbackTransport, ObjectStoreHandler, ParameterList,
};
use gdi_core::observability::DispatchCounts;
use gdi_core::ports::{Endpoint, JobVerifier, RequestQueue};

#[derive(Debug, Deserialize)]
struct JobRequest {
    name: String,
    #[serde(default = "one")]
    slots: u32,
}

fn one() -> u32 {
    1
}

/// Accepts job submissions and hands out job numbers.
struct JobHandler {
    next_job: AtomicU32,
}

impl JobHandler {
    fn new() -> Self {
        Self {
            next_job: AtomicU32::new(1),
        }
    }
}

#[async_trait]
impl TaskHandler for JobHandler {
    async fn handle(&self, task: &mut Task, origin: &Origin) -> Result<(), HandlerError> {
        if task.command().operation() != Operation::Add {
            return Err(HandlerError::Unsupported {
                operation: task.operation_name(),
                target: task.target(),
            });
        }
        let owner = origin
            .identity
            .as_ref()
            .map_or("unknown", |identity| identity.user.as_str())
            .to_string();

        let mut accepted = ObjectList::new();
        for job in task.take_data().unwrap_or_default() {
            let request: JobRequest = serde_json::from_value(job)
                .map_err(|e| HandlerError::Failed(format!("invalid job: {e}")))?;
            let number = self.next_job.fetch_add(1, Ordering::Relaxed);
            task.add_answer(Answer::ok(format!(
                "job {number} (\"{}\") has been submitted",
                request.name
            )));
            accepted.push(json!({
                "job_number": number,
                "name": request.name,
                "slots": request.slots,
                "owner": owner,
            }));
        }
        task.set_data(Some(accepted));
        Ok(())
    }
}

/// Fills in defaults and refuses jobs without a name.
struct DemoVerifier;

impl JobVerifier for DemoVerifier {
    fn verify(&self, mut job: Object, answers: &mut AnswerList) -> (Object, bool) {
        if job["name"].as_str().is_none_or(str::is_empty) {
            answers.push(Answer::error(AnswerStatus::Denied, "job has no name"));
            return (job, false);
        }
        if job.get("slots").is_none() {
            job["slots"] = json!(1);
        }
        (job, true)
    }
}

#[derive(Serialize)]
struct Report {
    internal: DispatchCounts,
    external: DispatchCounts,
}

fn auth(host: &str, component: &str) -> AuthContext {
    AuthContext {
        host: host.to_string(),
        component: component.to_string(),
        component_id: 1,
        identity: Identity {
            uid: 1000,
            gid: 1000,
            user: "demo".to_string(),
            group: "demo".to_string(),
            groups: vec![1000],
        },
    }
}

fn build_runtime() -> Result<Runtime, HandlerError> {
    let mut reg = HandlerRegistry::new();
    reg.register(
        Target::HOST_GROUP_LIST,
        Arc::new(ObjectStoreHandler::with_objects(
            "name",
            vec![
                json!({"name": "@allhosts", "hosts": ["node1", "node2"]}),
                json!({"name": "@gpu", "hosts": ["node2"]}),
            ],
        )),
    )?;
    reg.register(
        Target::EXEC_HOST_LIST,
        Arc::new(ObjectStoreHandler::with_objects(
            "name",
            vec![json!({"name": "node1"}), json!({"name": "node2"})],
        )),
    )?;
    reg.register(Target::JOB_LIST, Arc::new(JobHandler::new()))?;
    Ok(Runtime::new(Arc::new(reg)))
}

fn print_result(title: &str, result: &MultiResult) -> Result<(), serde_json::Error> {
    let body: Value = serde_json::to_value(result)?;
    println!("== {title}\n{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let params = ParameterList::parse(&std::env::var("GDI_PARAMS").unwrap_or_default());
    let master = Endpoint::new("localhost", "qmaster", 1);
    let runtime = Arc::new(build_runtime()?);

    // (A) master 側: 共有キューと worker group
    let queue: Arc<dyn RequestQueue> = Arc::new(InMemoryRequestQueue::new());
    let workers = WorkerGroup::spawn(
        2,
        Arc::clone(&queue),
        Arc::clone(&runtime),
        DEFAULT_POLL_INTERVAL,
    );

    // (B) internal dispatch: master 内のスレッドからの呼び出し
    let internal = GdiClient::new(
        Arc::new(InternalDispatch::new(Arc::clone(&queue), master.clone())),
        auth("localhost", "scheduler"),
    );
    let mut multi = internal.multi();
    multi.append(Target::HOST_GROUP_LIST, Command::get(), TaskInputs::new());
    let mut names = Some(Projection::fields(["name"]));
    multi.append(
        Target::EXEC_HOST_LIST,
        Command::get(),
        TaskInputs::new().projection(&mut names),
    );
    let result = multi.execute().await?.wait().await?;
    print_result("internal: host groups and exec hosts", &result)?;

    // (C) external dispatch: 別プロセスのクライアントを loopback で再現
    let codec = Arc::new(JsonPacketCodec::new());
    let transport = Arc::new(LoopbackTransport::new(
        master.clone(),
        Arc::clone(&runtime),
        codec.clone(),
    ));
    let external = GdiClient::new(
        Arc::new(
            ExternalDispatch::new(transport, codec, Arc::new(params), master)
                .with_job_verifier(Arc::new(DemoVerifier)),
        ),
        auth("submit01", "qsub"),
    );

    let jobs = ObjectList::from(vec![
        json!({"name": "render", "slots": 4}),
        json!({"name": "report"}),
    ]);
    let submitted = external
        .gdi(
            Target::JOB_LIST,
            Command::add().with(SubCommand::RETURN_NEW_VERSION),
            Some(jobs),
            None,
            None,
        )
        .await?;
    for answer in &submitted.answers {
        info!("{answer}");
    }

    let mut multi = external.multi();
    let mut new_host = Some(ObjectList::from(vec![json!({"name": "node3"})]));
    multi.append(
        Target::EXEC_HOST_LIST,
        Command::add(),
        TaskInputs::new().data(&mut new_host),
    );
    multi.append(Target::EXEC_HOST_LIST, Command::get(), TaskInputs::new());
    let result = multi.execute().await?.wait().await?;
    print_result("external: add exec host, then list", &result)?;

    // (D) 後片付け
    workers.shutdown_and_join().await;

    let report = Report {
        internal: internal.counters(),
        external: external.counters(),
    };
    println!("== counters\n{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
