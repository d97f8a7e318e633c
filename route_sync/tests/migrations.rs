mod common;
use common::{assert_sqlite_pragmas, setup_db};

use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Integer, Text};
use route_sync::db::{connection, migrate};
use std::thread::sleep;
use std::time::Duration;

#[derive(QueryableByName)]
struct TblCnt {
    #[diesel(sql_type = Integer)]
    cnt: i32,
}
#[derive(QueryableByName)]
struct TimeStr {
    #[diesel(sql_type = Text)]
    t: String,
}

#[test]
fn migrations_apply_and_pragmas_are_set() {
    let (_db, mut conn) = setup_db();
    assert_sqlite_pragmas(&mut conn);

    let tbls: TblCnt = sql_query(
        "SELECT COUNT(*) AS cnt
            FROM sqlite_master
            WHERE type='table'
            AND name IN ('calendar','active_journeys','active_calls','active_status','imports',
                         'vehicle_journeys','passing_times','dated_service_journeys');",
    )
    .get_result(&mut conn)
    .unwrap();
    assert_eq!(tbls.cnt, 8);
}

#[test]
fn migrations_are_idempotent() {
    let (db, _conn) = setup_db();
    migrate::run_sqlite(&db.path).expect("second run");
    let mut conn = connection::connect_sqlite(&db.path).unwrap();
    migrate::run_pending(&mut conn).expect("third run");
}

#[test]
fn status_updated_at_moves_on_update() {
    let (_db, mut conn) = setup_db();
    sql_query(
        "INSERT INTO imports (path, fingerprint, size, files, import_status)
         VALUES ('/routes', 'abc', 10, 1, 'imported');",
    )
    .execute(&mut conn)
    .unwrap();
    sql_query("INSERT INTO active_status (date, import_id, status) VALUES ('2024-01-01', 1, 'incomplete');")
        .execute(&mut conn)
        .unwrap();

    let read = |conn: &mut SqliteConnection| -> String {
        let row: TimeStr =
            sql_query("SELECT updated_at AS t FROM active_status WHERE date = '2024-01-01';")
                .get_result(conn)
                .unwrap();
        row.t
    };
    let before = read(&mut conn);

    // CURRENT_TIMESTAMP has second precision.
    sleep(Duration::from_millis(1100));

    sql_query("UPDATE active_status SET status = 'activated' WHERE date = '2024-01-01';")
        .execute(&mut conn)
        .unwrap();
    assert_ne!(before, read(&mut conn));
}

#[test]
fn schema_rejects_unknown_states_and_orphaned_owners() {
    let (_db, mut conn) = setup_db();
    assert!(
        sql_query(
            "INSERT INTO imports (path, fingerprint, size, files, import_status)
             VALUES ('/routes', 'abc', 10, 1, 'done');",
        )
        .execute(&mut conn)
        .is_err()
    );
    assert!(
        sql_query("INSERT INTO active_status (date, import_id, status) VALUES ('2024-01-01', 7, 'activated');")
            .execute(&mut conn)
            .is_err()
    );
}
