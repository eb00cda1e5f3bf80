//! State machine tests for CallExecutor

use super::*;
use crate::record::RecordSchema;
use crate::testing::ScriptedDriver;
use pretty_assertions::assert_eq;

#[derive(Debug, Default, PartialEq)]
struct Department {
    department_id: i64,
    name: String,
}

impl Record for Department {
    fn schema() -> RecordSchema<Self> {
        RecordSchema::new()
            .field("DepartmentId", |d: &mut Department, v: i64| d.department_id = v)
            .field("Name", |d: &mut Department, v: String| d.name = v)
    }
}

fn departments() -> ScriptedDriver {
    ScriptedDriver::new().with_result(
        &["DEPARTMENT_ID", "NAME"],
        vec![
            vec![Value::Int64(10), Value::from("Administration")],
            vec![Value::Int64(50), Value::from("Shipping")],
        ],
    )
}

fn info() -> ConnectionInfo {
    ConnectionInfo::new("scripted", "hr")
}

fn connected(driver: &ScriptedDriver, spec: CallSpec) -> CallExecutor<ScriptedDriver> {
    let mut call = CallExecutor::new(driver.clone(), spec);
    call.connect(&info()).unwrap();
    call
}

#[test]
fn test_new_call_is_unconfigured_with_auto_bind() {
    let call = CallExecutor::new(departments(), CallSpec::query("select 1"));
    assert_eq!(call.state(), CallState::Unconfigured);
    assert!(call.auto_bind());
    assert_eq!(call.spec().kind(), CallKind::Query);
}

#[test]
fn test_connect_prepares_statement_for_kind() {
    let driver = departments();
    let call = connected(&driver, CallSpec::procedure("hr.get_departments"));

    assert_eq!(call.state(), CallState::Connected);
    let log = driver.log();
    assert_eq!(log.opened, 1);
    assert_eq!(
        log.prepared,
        vec![("hr.get_departments".to_string(), CallKind::Procedure)]
    );
}

#[test]
fn test_connect_twice_is_rejected() {
    let driver = departments();
    let mut call = connected(&driver, CallSpec::query("select name from departments"));
    let err = call.connect(&info()).unwrap_err();
    assert!(matches!(err, CallError::NotConnected { operation: "connect", .. }));
    assert_eq!(driver.log().opened, 1);
}

#[test]
fn test_open_failure_marks_call_failed() {
    let driver = ScriptedDriver::new().failing_open("listener refused the connection");
    let mut call = CallExecutor::new(driver, CallSpec::query("select 1"));

    let err = call.connect(&info()).unwrap_err();
    assert!(matches!(err, CallError::Connection(ref m) if m.contains("listener refused")));
    assert_eq!(call.state(), CallState::Failed);
}

#[test]
fn test_prepare_failure_closes_connection() {
    let driver = ScriptedDriver::new().failing_prepare("no such routine");
    let mut call = CallExecutor::new(driver.clone(), CallSpec::procedure("missing"));

    let err = call.connect(&info()).unwrap_err();
    assert!(matches!(err, CallError::Connection(_)));
    assert_eq!(call.state(), CallState::Failed);
    assert_eq!(driver.log().closed, 1);
}

#[test]
fn test_execute_returns_first_column_as_text() {
    let driver = departments();
    let mut call = connected(&driver, CallSpec::query("select department_id, name from departments"));

    let rows = call.execute().unwrap();
    assert_eq!(rows, vec!["10".to_string(), "50".to_string()]);
    assert_eq!(call.state(), CallState::Executed);
}

#[test]
fn test_execute_null_first_column_is_type_mismatch() {
    let driver = ScriptedDriver::new().with_result(&["MANAGER_ID"], vec![vec![Value::Null]]);
    let mut call = connected(&driver, CallSpec::query("select manager_id from departments"));

    let err = call.execute().unwrap_err();
    assert!(matches!(
        err,
        CallError::TypeMismatch { column: Some(ref c), .. } if c == "MANAGER_ID"
    ));
    assert_eq!(call.state(), CallState::Failed);
}

#[test]
fn test_execute_binds_parameters_before_running() {
    let driver = departments();
    let mut call = CallExecutor::new(
        driver.clone(),
        CallSpec::query("select name from departments where location_id = :location_id"),
    );
    call.add_input("location_id", DbType::Int32, 1700).unwrap();
    call.connect(&info()).unwrap();
    call.execute().unwrap();

    let log = driver.log();
    assert_eq!(log.bound.len(), 1);
    assert_eq!(log.bound[0].name, "location_id");
    assert_eq!(log.bound[0].value, Some(Value::String("1700".into())));
    assert_eq!(log.readers, 1);
}

#[test]
fn test_second_execution_is_rejected() {
    let driver = departments();
    let mut call = connected(&driver, CallSpec::query("select name from departments"));
    call.execute().unwrap();

    let err = call.execute().unwrap_err();
    assert!(matches!(err, CallError::NotConnected { operation: "execute", .. }));
    assert_eq!(driver.log().readers, 1);
}

#[test]
fn test_registration_after_execution_is_rejected() {
    let driver = departments();
    let mut call = connected(&driver, CallSpec::query("select name from departments"));
    call.execute().unwrap();

    assert!(matches!(
        call.add_input("id", DbType::Int32, 1),
        Err(CallError::NotConnected { .. })
    ));
    assert!(matches!(
        call.add_binding("NAME", "Name"),
        Err(CallError::NotConnected { .. })
    ));
    assert!(matches!(call.set_auto_bind(false), Err(CallError::NotConnected { .. })));
}

#[test]
fn test_return_value_ordering_error_wins_over_state() {
    let driver = departments();
    let mut call = connected(&driver, CallSpec::function("hr.count_staff"));
    call.add_input("department_id", DbType::Int32, 50).unwrap();
    call.close().unwrap();

    let err = call.add_return_value(DbType::Int32, None).unwrap_err();
    assert!(matches!(err, CallError::Configuration(_)));
}

#[test]
fn test_registration_allowed_while_connected() {
    let driver = departments();
    let mut call = connected(&driver, CallSpec::query("select name from departments where 1 = :one"));
    call.add_input("one", DbType::Int32, 1).unwrap();
    call.add_binding("NAME", "Name").unwrap();
    assert_eq!(call.parameters().len(), 1);
    assert_eq!(call.bindings().len(), 1);
}

#[test]
fn test_execute_typed_binds_records() {
    let driver = departments();
    let mut call = connected(&driver, CallSpec::query("select department_id, name from departments"));

    let rows: Vec<Department> = call.execute_typed().unwrap();
    assert_eq!(
        rows,
        vec![
            Department {
                department_id: 10,
                name: "Administration".into(),
            },
            Department {
                department_id: 50,
                name: "Shipping".into(),
            },
        ]
    );
}

#[test]
fn test_execute_typed_rejects_function_calls() {
    let driver = departments();
    let mut call = CallExecutor::new(driver.clone(), CallSpec::function("hr.count_staff"));
    call.add_return_value(DbType::Int32, None).unwrap();
    call.connect(&info()).unwrap();

    let err = call.execute_typed::<Department>().unwrap_err();
    assert!(matches!(err, CallError::CallKind(_)));
    assert_eq!(call.state(), CallState::Connected);
    assert_eq!(driver.log().executions(), 0);
}

#[test]
fn test_ambiguous_bindings_fail_before_execution() {
    let driver = departments();
    let mut call = CallExecutor::new(driver.clone(), CallSpec::query("select department_id, name from departments"));
    call.add_binding("DEPARTMENT_ID", "Name").unwrap();
    call.add_binding("NAME", "Name").unwrap();
    call.connect(&info()).unwrap();

    let err = call.execute_typed::<Department>().unwrap_err();
    assert!(matches!(err, CallError::AmbiguousBinding(_)));
    assert_eq!(driver.log().executions(), 0);
}

#[test]
fn test_unknown_field_marks_call_failed() {
    let driver = departments();
    let mut call = CallExecutor::new(driver, CallSpec::query("select department_id, name from departments"));
    call.add_binding("NAME", "DepartmentName").unwrap();
    call.connect(&info()).unwrap();

    let err = call.execute_typed::<Department>().unwrap_err();
    assert!(matches!(err, CallError::UnknownField(ref f) if f == "DepartmentName"));
    assert_eq!(call.state(), CallState::Failed);
}

#[test]
fn test_execute_function_requires_return_value() {
    let driver = ScriptedDriver::new().with_output(RETURN_VALUE_NAME, 3i64);
    let mut call = connected(&driver, CallSpec::function("hr.count_staff"));

    let err = call.execute_function::<i64>().unwrap_err();
    assert!(matches!(err, CallError::Configuration(_)));
    assert_eq!(driver.log().executions(), 0);
}

#[test]
fn test_execute_function_rejects_other_kinds() {
    let driver = departments();
    let mut call = connected(&driver, CallSpec::procedure("hr.get_departments"));
    assert!(matches!(
        call.execute_function::<i64>(),
        Err(CallError::CallKind(_))
    ));
}

#[test]
fn test_execute_non_query_returns_affected_rows() {
    let driver = ScriptedDriver::new().with_affected_rows(3);
    let mut call = connected(&driver, CallSpec::command("update departments set location_id = 1800"));

    assert_eq!(call.execute_non_query().unwrap(), 3);
    assert_eq!(driver.log().non_queries, 1);
    assert_eq!(call.state(), CallState::Executed);
}

#[test]
fn test_driver_failure_during_execution() {
    let driver = departments().failing_execute("ORA-00942: table or view does not exist");
    let mut call = connected(&driver, CallSpec::query("select name from departmentz"));

    let err = call.execute().unwrap_err();
    assert!(matches!(err, CallError::Driver(ref m) if m.contains("ORA-00942")));
    assert_eq!(call.state(), CallState::Failed);
}

#[test]
fn test_output_value_after_execution() {
    let driver = ScriptedDriver::new()
        .with_affected_rows(1)
        .with_output("staff_count", Value::Decimal("12".into()));
    let mut call = CallExecutor::new(driver.clone(), CallSpec::procedure("hr.count_staff"));
    call.add_input("department_id", DbType::Int32, 50).unwrap();
    call.add_output("staff_count", DbType::Int32, 4).unwrap();

    call.connect(&info()).unwrap();
    assert!(matches!(
        call.output_value::<i32>("staff_count"),
        Err(CallError::NotConnected { .. })
    ));

    call.execute_non_query().unwrap();
    assert_eq!(call.output_value::<i32>("staff_count").unwrap(), 12);
    assert!(matches!(
        call.output_value::<i32>("department_id"),
        Err(CallError::Configuration(_))
    ));
    assert!(matches!(
        call.output_value::<i32>("unknown"),
        Err(CallError::Configuration(_))
    ));
}

#[test]
fn test_close_is_idempotent() {
    let driver = departments();
    let mut call = connected(&driver, CallSpec::query("select name from departments"));

    call.close().unwrap();
    call.close().unwrap();
    drop(call);

    assert_eq!(driver.log().closed, 1);
}

#[test]
fn test_drop_releases_connection_after_failure() {
    let driver = departments().failing_execute("lost connection");
    {
        let mut call = connected(&driver, CallSpec::query("select name from departments"));
        let _ = call.execute();
    }
    assert_eq!(driver.log().closed, 1);
}
