//! Resolver glue between the relation set and hook operations.

mod common;

use common::Fixture;
use uniter_core::{HookInfo, Life, RelationId};
use uniter_relation::{
    Error, LocalState, OperationFactory, OperationKind, RelationSnapshot, RelationsResolver,
    Snapshot,
};

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Describes operations instead of running them.
struct DescribingFactory;

impl OperationFactory for DescribingFactory {
    type Operation = String;

    fn new_run_hook(&self, info: HookInfo) -> uniter_relation::Result<String> {
        Ok(format!("run {info}"))
    }
}

struct RefusingFactory;

impl OperationFactory for RefusingFactory {
    type Operation = ();

    fn new_run_hook(&self, _info: HookInfo) -> uniter_relation::Result<()> {
        Err(Error::operation("hook runner unavailable"))
    }
}

fn snapshot() -> Snapshot {
    Snapshot::new(Life::Alive).with_relation(
        RelationId::new(1),
        RelationSnapshot::new(Life::Alive).with_member("mysql/0", 2),
    )
}

#[tokio::test]
async fn given_pending_join_when_next_op_then_run_hook_operation_built() -> TestResult {
    let fixture = Fixture::new()?;
    fixture.add_relation(1);
    let mut resolver = RelationsResolver::new(fixture.build().await?);

    let op = resolver
        .next_op(&LocalState::default(), &snapshot(), &DescribingFactory)
        .await?;

    let expected = HookInfo::joined(RelationId::new(1), "mysql/0", 2);
    assert_eq!(op, Some(format!("run {expected}")));
    Ok(())
}

#[tokio::test]
async fn given_nothing_to_do_when_next_op_then_no_operation() -> TestResult {
    let fixture = Fixture::new()?;
    fixture.add_relation(1);
    let mut resolver = RelationsResolver::new(fixture.build().await?);

    let joined = HookInfo::joined(RelationId::new(1), "mysql/0", 2);
    resolver
        .next_op(&LocalState::default(), &snapshot(), &DescribingFactory)
        .await?;
    resolver.relations_mut().commit_hook(&joined).await?;

    let op = resolver
        .next_op(&LocalState::default(), &snapshot(), &DescribingFactory)
        .await?;
    assert_eq!(op, None);
    assert_eq!(resolver.relations().relation_ids(), vec![RelationId::new(1)]);
    Ok(())
}

#[tokio::test]
async fn given_executor_installing_when_next_op_then_no_operation() -> TestResult {
    let fixture = Fixture::new()?;
    fixture.add_relation(1);
    let mut resolver = RelationsResolver::new(fixture.build().await?);

    let op = resolver
        .next_op(
            &LocalState::new(OperationKind::Install),
            &snapshot(),
            &DescribingFactory,
        )
        .await?;

    assert_eq!(op, None);
    Ok(())
}

#[tokio::test]
async fn given_factory_failure_when_next_op_then_error_returned() -> TestResult {
    let fixture = Fixture::new()?;
    fixture.add_relation(1);
    let mut resolver = RelationsResolver::new(fixture.build().await?);

    let result = resolver
        .next_op(&LocalState::default(), &snapshot(), &RefusingFactory)
        .await;

    assert!(matches!(result, Err(Error::Operation { .. })));
    Ok(())
}
