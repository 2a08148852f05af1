//! Dispatcher-processor exchange flows against an in-memory store: first
//! contact, assignment, result acceptance, and reconciliation.

use dispatcher_core::config::DispatcherConfig;
use dispatcher_core::core::DispatcherCore;
use dispatcher_core::exchange::{ProcessorReport, TaskResultReport, UploadedOutput};
use dispatcher_core::models::{ExecutionContext, FunctionRef, Task, VariableRef};
use dispatcher_core::state_machine::{TaskState, VariableState};
use dispatcher_core::storage::InMemoryStore;
use std::sync::Arc;
use uuid::Uuid;

fn test_core() -> DispatcherCore {
    let config = DispatcherConfig {
        group_capacity: 10,
        min_resident_groups: 0,
        ..Default::default()
    };
    DispatcherCore::new(config, Arc::new(InMemoryStore::new()))
}

async fn queued_task(core: &DispatcherCore, context: &ExecutionContext, order: i64) -> Task {
    let input = core.create_variable(context.id, "in").await.unwrap();
    let output = core.create_variable(context.id, "out").await.unwrap();
    let task = Task::new(context.id, Uuid::new_v4(), order)
        .with_function(FunctionRef::new("def f(x): return x"))
        .with_input(VariableRef::new(input.id, "in").with_content_hash("input_hash"))
        .with_output(VariableRef::new(output.id, "out"));
    core.add_new_task(task.clone()).await.unwrap();
    task
}

async fn register_processor(core: &DispatcherCore) -> (Uuid, String) {
    let response = core
        .exchange()
        .process(ProcessorReport {
            requests_identity: true,
            ..Default::default()
        })
        .await
        .unwrap();
    let identity = response.issued_identity.expect("identity issued on first contact");
    (identity.processor_id, identity.session_token)
}

#[tokio::test]
async fn first_contact_issues_identity() {
    let core = test_core();
    let (processor_id, session_token) = register_processor(&core).await;

    let stored = core
        .store()
        .load_processor(processor_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.session_token, session_token);
}

#[tokio::test]
async fn known_processor_does_not_get_a_new_identity() {
    let core = test_core();
    let (processor_id, session_token) = register_processor(&core).await;

    let response = core
        .exchange()
        .process(ProcessorReport {
            processor_id: Some(processor_id),
            session_token: Some(session_token),
            requests_identity: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(response.issued_identity.is_none());
}

#[tokio::test]
async fn session_token_mismatch_is_rejected() {
    let core = test_core();
    let (processor_id, _) = register_processor(&core).await;

    let result = core
        .exchange()
        .process(ProcessorReport {
            processor_id: Some(processor_id),
            session_token: Some("forged".to_string()),
            ..Default::default()
        })
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn assignment_follows_queue_order_and_marks_state() {
    let core = test_core();
    let context = core.create_execution_context().await.unwrap();
    let first = queued_task(&core, &context, 0).await;
    let second = queued_task(&core, &context, 1).await;
    core.declare_tasks_produced(context.id).await.unwrap();

    let (processor_id, session_token) = register_processor(&core).await;
    let report = ProcessorReport {
        processor_id: Some(processor_id),
        session_token: Some(session_token),
        requests_task: true,
        ..Default::default()
    };

    let response = core.exchange().process(report.clone()).await.unwrap();
    let assignment = response.assigned_task.expect("first task assigned");
    assert_eq!(assignment.task_id, first.id);
    assert_eq!(assignment.function.code, "def f(x): return x");

    let stored = core.store().load_task(first.id).await.unwrap().unwrap();
    assert_eq!(stored.state, TaskState::Assigned);

    // The next poll gets the next task, not the same one twice.
    let response = core.exchange().process(report).await.unwrap();
    assert_eq!(response.assigned_task.unwrap().task_id, second.id);
}

#[tokio::test]
async fn accepted_result_completes_task_and_uploads_outputs() {
    let core = test_core();
    let context = core.create_execution_context().await.unwrap();
    let task = queued_task(&core, &context, 0).await;
    core.declare_tasks_produced(context.id).await.unwrap();

    let (processor_id, session_token) = register_processor(&core).await;
    core.exchange()
        .process(ProcessorReport {
            processor_id: Some(processor_id),
            session_token: Some(session_token.clone()),
            requests_task: true,
            ..Default::default()
        })
        .await
        .unwrap();

    let output_id = task.outputs[0].variable_id;
    let response = core
        .exchange()
        .process(ProcessorReport {
            processor_id: Some(processor_id),
            session_token: Some(session_token),
            finished_tasks: Some(vec![TaskResultReport {
                task_id: task.id,
                success: true,
                outputs: vec![UploadedOutput {
                    variable_id: output_id,
                    content_hash: Some("out_hash".to_string()),
                    payload_ref: Some("blob://out".to_string()),
                    nullified: false,
                }],
            }]),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(response.acknowledged_task_ids, vec![task.id]);

    let stored = core.store().load_task(task.id).await.unwrap().unwrap();
    assert_eq!(stored.state, TaskState::Completed);

    let variable = core
        .store()
        .load_variable(output_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(variable.state, VariableState::Initialized);
    assert_eq!(variable.content_hash.as_deref(), Some("out_hash"));

    // Completion retires the queue entry and leaves the durable record.
    assert!(!core.queue().already_registered(task.id));
    assert!(core.store().load_task(task.id).await.unwrap().is_some());

    // The upload flows into the readiness projection on the next flush.
    let stats = core.aggregator().process_flushing().await;
    assert_eq!(stats.contexts_flushed, 1);
}

#[tokio::test]
async fn failed_result_marks_task_error() {
    let core = test_core();
    let context = core.create_execution_context().await.unwrap();
    let task = queued_task(&core, &context, 0).await;
    core.declare_tasks_produced(context.id).await.unwrap();

    let (processor_id, session_token) = register_processor(&core).await;
    core.exchange()
        .process(ProcessorReport {
            processor_id: Some(processor_id),
            session_token: Some(session_token.clone()),
            requests_task: true,
            ..Default::default()
        })
        .await
        .unwrap();

    core.exchange()
        .process(ProcessorReport {
            processor_id: Some(processor_id),
            session_token: Some(session_token),
            finished_tasks: Some(vec![TaskResultReport {
                task_id: task.id,
                success: false,
                outputs: vec![],
            }]),
            ..Default::default()
        })
        .await
        .unwrap();

    let stored = core.store().load_task(task.id).await.unwrap().unwrap();
    assert_eq!(stored.state, TaskState::Error);
}

#[tokio::test]
async fn forgotten_assignment_is_remarked_retriable() {
    let core = test_core();
    let context = core.create_execution_context().await.unwrap();
    let task = queued_task(&core, &context, 0).await;
    core.declare_tasks_produced(context.id).await.unwrap();

    let (processor_id, session_token) = register_processor(&core).await;
    core.exchange()
        .process(ProcessorReport {
            processor_id: Some(processor_id),
            session_token: Some(session_token.clone()),
            requests_task: true,
            ..Default::default()
        })
        .await
        .unwrap();

    // The processor restarts and reports an empty task list.
    core.exchange()
        .process(ProcessorReport {
            processor_id: Some(processor_id),
            session_token: Some(session_token.clone()),
            known_task_ids: Some(vec![]),
            ..Default::default()
        })
        .await
        .unwrap();

    let stored = core.store().load_task(task.id).await.unwrap().unwrap();
    assert_eq!(stored.state, TaskState::InQueue);

    // The task is offered again on the next poll.
    let response = core
        .exchange()
        .process(ProcessorReport {
            processor_id: Some(processor_id),
            session_token: Some(session_token),
            requests_task: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(response.assigned_task.unwrap().task_id, task.id);
}

#[tokio::test]
async fn unknown_reported_task_is_discarded() {
    let core = test_core();
    let (processor_id, session_token) = register_processor(&core).await;
    let ghost = Uuid::new_v4();

    let response = core
        .exchange()
        .process(ProcessorReport {
            processor_id: Some(processor_id),
            session_token: Some(session_token),
            known_task_ids: Some(vec![ghost]),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(response.discard_task_ids, vec![ghost]);
}

#[tokio::test]
async fn empty_report_is_a_no_op() {
    let core = test_core();
    let response = core
        .exchange()
        .process(ProcessorReport::default())
        .await
        .unwrap();
    assert_eq!(response, Default::default());
}
