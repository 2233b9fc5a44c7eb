use chrono::{TimeZone, Utc};
use rusqlite::Connection;
use timetree_core::db::open_db_in_memory;
use timetree_core::{
    CalendarNode, FixedClock, Granularity, GraphStore, NodeId, SqliteGraphStore, TimeTree,
    TimeTreeConfig, Tz,
};

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn utc_millis(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> i64 {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .unwrap()
        .timestamp_millis()
}

fn day(year: i32, month: u32, day: u32) -> i64 {
    utc_millis(year, month, day, 0, 0)
}

fn values(nodes: &[CalendarNode]) -> Vec<i64> {
    nodes.iter().map(|node| node.value.unwrap()).collect()
}

fn edge_snapshot(conn: &Connection) -> Vec<(String, String, String, String)> {
    let mut stmt = conn
        .prepare(
            "SELECT edge_uuid, from_uuid, to_uuid, edge_type
             FROM graph_edges
             ORDER BY edge_uuid ASC;",
        )
        .unwrap();
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
        .unwrap();
    rows.map(Result::unwrap).collect()
}

fn child_edge_targets(conn: &Connection, parent: NodeId) -> Vec<String> {
    let mut stmt = conn
        .prepare(
            "SELECT to_uuid
             FROM graph_edges
             WHERE from_uuid = ?1 AND edge_type = 'CHILD'
             ORDER BY to_uuid ASC;",
        )
        .unwrap();
    let rows = stmt
        .query_map([parent.to_string()], |row| row.get(0))
        .unwrap();
    rows.map(Result::unwrap).collect()
}

#[test]
fn days_inserted_out_of_order_are_kept_sorted_under_one_month() {
    let conn = setup();
    let tree = TimeTree::new(SqliteGraphStore::try_new(&conn).unwrap());

    tree.get_instant(day(2023, 5, 4)).unwrap();
    tree.get_instant(day(2023, 5, 10)).unwrap();
    tree.get_instant(day(2023, 5, 1)).unwrap();

    let root = tree.get_or_create_root().unwrap();
    let years = tree.children(root).unwrap();
    assert_eq!(values(&years), vec![2023]);
    assert_eq!(years[0].granularity, Granularity::Year);

    let months = tree.children(years[0].id).unwrap();
    assert_eq!(values(&months), vec![5]);

    let days = tree.children(months[0].id).unwrap();
    assert_eq!(values(&days), vec![1, 4, 10]);
    assert!(days.iter().all(|node| node.granularity == Granularity::Day));

    assert_eq!(tree.first_child(months[0].id).unwrap(), Some(days[0]));
    assert_eq!(tree.last_child(months[0].id).unwrap(), Some(days[2]));
    assert_eq!(tree.previous(days[0].id).unwrap(), None);
    assert_eq!(tree.next(days[0].id).unwrap(), Some(days[1]));
    assert_eq!(tree.next(days[1].id).unwrap(), Some(days[2]));
    assert_eq!(tree.next(days[2].id).unwrap(), None);

    assert_eq!(tree.store().node_count().unwrap(), 6);
    assert_eq!(child_edge_targets(&conn, months[0].id).len(), 3);
}

#[test]
fn first_call_on_empty_store_builds_a_single_path_to_today() {
    let conn = setup();
    let now = utc_millis(2024, 2, 29, 17, 5);
    let tree = TimeTree::new(SqliteGraphStore::try_new(&conn).unwrap()).with_clock(FixedClock(now));

    let day_node = tree.get_now().unwrap();
    assert_eq!(day_node.granularity, Granularity::Day);
    assert_eq!(day_node.value, Some(29));
    assert_eq!(tree.store().node_count().unwrap(), 4);

    let month = tree.parent_of(day_node.id).unwrap().unwrap();
    let year = tree.parent_of(month.id).unwrap().unwrap();
    let root = tree.parent_of(year.id).unwrap().unwrap();
    assert_eq!(month.value, Some(2));
    assert_eq!(year.value, Some(2024));
    assert!(root.is_root());
    assert_eq!(root.value, None);
    assert_eq!(tree.parent_of(root.id).unwrap(), None);

    for (parent, child) in [(root, year), (year, month), (month, day_node)] {
        assert_eq!(tree.first_child(parent.id).unwrap(), Some(child));
        assert_eq!(tree.last_child(parent.id).unwrap(), Some(child));
        assert_eq!(tree.next(child.id).unwrap(), None);
        assert_eq!(tree.previous(child.id).unwrap(), None);
    }
    assert_eq!(tree.first_child(day_node.id).unwrap(), None);
    assert_eq!(tree.last_child(day_node.id).unwrap(), None);
    assert!(tree.children(day_node.id).unwrap().is_empty());
}

#[test]
fn resolving_the_same_instant_twice_changes_nothing() {
    let conn = setup();
    let tree = TimeTree::new(SqliteGraphStore::try_new(&conn).unwrap());
    let instant = utc_millis(2023, 5, 4, 9, 30);

    tree.get_instant(day(2023, 5, 1)).unwrap();
    let first = tree
        .get_instant_at_resolution(instant, Granularity::Minute)
        .unwrap();
    let nodes_before = tree.store().node_count().unwrap();
    let edges_before = edge_snapshot(&conn);

    let second = tree
        .get_instant_at_resolution(instant, Granularity::Minute)
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(tree.store().node_count().unwrap(), nodes_before);
    assert_eq!(edge_snapshot(&conn), edges_before);
}

#[test]
fn instants_sharing_a_day_share_every_ancestor_down_to_it() {
    let conn = setup();
    let tree = TimeTree::new(SqliteGraphStore::try_new(&conn).unwrap());

    let morning = tree
        .get_instant_at_resolution(utc_millis(2023, 5, 4, 8, 15), Granularity::Minute)
        .unwrap();
    let evening = tree
        .get_instant_at_resolution(utc_millis(2023, 5, 4, 20, 15), Granularity::Minute)
        .unwrap();
    assert_ne!(morning.id, evening.id);
    assert_eq!(morning.value, evening.value);

    let morning_hour = tree.parent_of(morning.id).unwrap().unwrap();
    let evening_hour = tree.parent_of(evening.id).unwrap().unwrap();
    assert_ne!(morning_hour.id, evening_hour.id);
    assert_eq!(morning_hour.value, Some(8));
    assert_eq!(evening_hour.value, Some(20));

    let morning_day = tree.parent_of(morning_hour.id).unwrap().unwrap();
    let evening_day = tree.parent_of(evening_hour.id).unwrap().unwrap();
    assert_eq!(morning_day, evening_day);
    assert_eq!(
        tree.parent_of(morning_day.id).unwrap(),
        tree.parent_of(evening_day.id).unwrap()
    );

    // The two minute nodes are adjacent on their level even though their
    // parents differ.
    assert_eq!(tree.next(morning.id).unwrap(), Some(evening));
    assert_eq!(tree.previous(evening.id).unwrap(), Some(morning));
}

#[test]
fn last_day_of_month_links_to_first_day_of_next_month_once_it_exists() {
    let conn = setup();
    let tree = TimeTree::new(SqliteGraphStore::try_new(&conn).unwrap());

    let may_31 = tree.get_instant(day(2023, 5, 31)).unwrap();
    assert_eq!(tree.next(may_31.id).unwrap(), None);

    let june_1 = tree.get_instant(day(2023, 6, 1)).unwrap();
    assert_eq!(tree.next(may_31.id).unwrap(), Some(june_1));
    assert_eq!(tree.previous(june_1.id).unwrap(), Some(may_31));

    let may = tree.parent_of(may_31.id).unwrap().unwrap();
    let june = tree.parent_of(june_1.id).unwrap().unwrap();
    assert_eq!(tree.next(may.id).unwrap(), Some(june));
}

#[test]
fn chain_crosses_year_boundaries() {
    let conn = setup();
    let tree = TimeTree::new(SqliteGraphStore::try_new(&conn).unwrap());

    let new_year = tree.get_instant(day(2013, 1, 1)).unwrap();
    let new_years_eve = tree.get_instant(day(2012, 12, 31)).unwrap();
    let later = tree.get_instant(day(2013, 1, 4)).unwrap();
    let earlier = tree.get_instant(day(2012, 11, 10)).unwrap();

    assert_eq!(tree.previous(earlier.id).unwrap(), None);
    assert_eq!(tree.next(earlier.id).unwrap(), Some(new_years_eve));
    assert_eq!(tree.next(new_years_eve.id).unwrap(), Some(new_year));
    assert_eq!(tree.next(new_year.id).unwrap(), Some(later));
    assert_eq!(tree.next(later.id).unwrap(), None);

    let root = tree.get_or_create_root().unwrap();
    assert_eq!(values(&tree.children(root).unwrap()), vec![2012, 2013]);
}

#[test]
fn first_child_of_a_middle_parent_is_spliced_between_its_cousins() {
    let conn = setup();
    let tree = TimeTree::new(SqliteGraphStore::try_new(&conn).unwrap());

    let may_31 = tree.get_instant(day(2023, 5, 31)).unwrap();
    let july_1 = tree.get_instant(day(2023, 7, 1)).unwrap();
    assert_eq!(tree.next(may_31.id).unwrap(), Some(july_1));

    let june_15 = tree.get_instant(day(2023, 6, 15)).unwrap();
    assert_eq!(tree.next(may_31.id).unwrap(), Some(june_15));
    assert_eq!(tree.next(june_15.id).unwrap(), Some(july_1));
    assert_eq!(tree.previous(july_1.id).unwrap(), Some(june_15));
}

#[test]
fn childless_parents_are_skipped_when_linking_cousins() {
    let conn = setup();
    let tree = TimeTree::new(SqliteGraphStore::try_new(&conn).unwrap());

    let june = tree
        .get_instant_at_resolution(day(2023, 6, 15), Granularity::Month)
        .unwrap();
    let may_31 = tree.get_instant(day(2023, 5, 31)).unwrap();
    let july_1 = tree.get_instant(day(2023, 7, 1)).unwrap();

    assert!(tree.children(june.id).unwrap().is_empty());
    assert_eq!(tree.next(may_31.id).unwrap(), Some(july_1));

    let june_15 = tree.get_instant(day(2023, 6, 15)).unwrap();
    assert_eq!(tree.parent_of(june_15.id).unwrap(), Some(june));
    assert_eq!(tree.next(may_31.id).unwrap(), Some(june_15));
    assert_eq!(tree.next(june_15.id).unwrap(), Some(july_1));
}

#[test]
fn time_zone_decides_which_calendar_nodes_an_instant_lands_on() {
    let conn = setup();
    let tree = TimeTree::new(SqliteGraphStore::try_new(&conn).unwrap());
    let instant = utc_millis(2013, 12, 31, 23, 30);

    let utc_hour = tree
        .get_instant_with(instant, Tz::UTC, Granularity::Hour)
        .unwrap();
    let prague_hour = tree
        .get_instant_with(instant, chrono_tz::Europe::Prague, Granularity::Hour)
        .unwrap();

    assert_eq!(utc_hour.value, Some(23));
    assert_eq!(prague_hour.value, Some(0));
    assert_eq!(tree.next(utc_hour.id).unwrap(), Some(prague_hour));

    let root = tree.get_or_create_root().unwrap();
    assert_eq!(values(&tree.children(root).unwrap()), vec![2013, 2014]);
}

#[test]
fn configured_defaults_apply_when_arguments_are_omitted() {
    let conn = setup();
    let config = TimeTreeConfig {
        default_resolution: Granularity::Hour,
        default_time_zone: chrono_tz::Asia::Tokyo,
    };
    let tree = TimeTree::with_config(SqliteGraphStore::try_new(&conn).unwrap(), config).unwrap();
    let instant = utc_millis(2023, 5, 4, 20, 0);

    let node = tree.get_instant(instant).unwrap();
    assert_eq!(node.granularity, Granularity::Hour);
    assert_eq!(node.value, Some(5));

    let day_node = tree
        .get_instant_at_resolution(instant, Granularity::Day)
        .unwrap();
    assert_eq!(day_node.value, Some(5));
    assert_eq!(tree.parent_of(node.id).unwrap(), Some(day_node));

    let utc_node = tree.get_instant_in_zone(instant, Tz::UTC).unwrap();
    assert_eq!(utc_node.value, Some(20));
}

#[test]
fn now_family_uses_the_clock() {
    let conn = setup();
    let now = utc_millis(2020, 1, 1, 12, 0);
    let tree = TimeTree::new(SqliteGraphStore::try_new(&conn).unwrap()).with_clock(FixedClock(now));

    assert_eq!(tree.get_now().unwrap(), tree.get_instant(now).unwrap());
    assert_eq!(
        tree.get_now_at_resolution(Granularity::Year).unwrap().value,
        Some(2020)
    );
    assert_eq!(
        tree.get_now_in_zone(chrono_tz::America::Los_Angeles)
            .unwrap()
            .value,
        Some(1)
    );
    assert_eq!(
        tree.get_now_with(chrono_tz::Pacific::Kiritimati, Granularity::Hour)
            .unwrap()
            .value,
        Some(2)
    );
}

#[test]
fn millisecond_resolution_builds_the_full_ladder() {
    let conn = setup();
    let tree = TimeTree::new(SqliteGraphStore::try_new(&conn).unwrap());
    let instant = utc_millis(2023, 5, 4, 13, 45) + 7_321;

    let leaf = tree
        .get_instant_at_resolution(instant, Granularity::Millisecond)
        .unwrap();
    assert_eq!(leaf.value, Some(321));
    assert_eq!(tree.store().node_count().unwrap(), 8);

    let mut granularities = vec![leaf.granularity];
    let mut cursor = leaf;
    while let Some(parent) = tree.parent_of(cursor.id).unwrap() {
        granularities.push(parent.granularity);
        cursor = parent;
    }
    granularities.reverse();
    assert_eq!(granularities, Granularity::ladder());
}

#[test]
fn root_resolution_returns_the_root() {
    let conn = setup();
    let tree = TimeTree::new(SqliteGraphStore::try_new(&conn).unwrap());

    let root = tree
        .get_instant_at_resolution(day(2023, 5, 4), Granularity::Root)
        .unwrap();
    assert!(root.is_root());
    assert_eq!(root.id, tree.get_or_create_root().unwrap());
    assert_eq!(tree.store().node_count().unwrap(), 1);
}

#[test]
fn uncommitted_transaction_leaves_no_nodes_behind() {
    let mut conn = setup();

    {
        let tx = conn.transaction().unwrap();
        let tree = TimeTree::new(SqliteGraphStore::try_new(&tx).unwrap());
        tree.get_instant(day(2023, 5, 4)).unwrap();
        assert_eq!(tree.store().node_count().unwrap(), 4);
    }

    let store = SqliteGraphStore::try_new(&conn).unwrap();
    assert_eq!(store.node_count().unwrap(), 0);
    assert_eq!(store.edge_count().unwrap(), 0);

    let tx = conn.transaction().unwrap();
    let tree = TimeTree::new(SqliteGraphStore::try_new(&tx).unwrap());
    let node = tree.get_instant(day(2023, 5, 4)).unwrap();
    tx.commit().unwrap();

    let tree = TimeTree::new(SqliteGraphStore::try_new(&conn).unwrap());
    assert_eq!(tree.get_instant(day(2023, 5, 4)).unwrap(), node);
    assert_eq!(tree.store().node_count().unwrap(), 4);
}

#[test]
fn tree_persists_across_reopened_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timetree.db");

    let first = {
        let conn = timetree_core::db::open_db(&path).unwrap();
        let tree = TimeTree::new(SqliteGraphStore::try_new(&conn).unwrap());
        tree.get_instant(day(2023, 5, 4)).unwrap()
    };

    let conn = timetree_core::db::open_db(&path).unwrap();
    let tree = TimeTree::new(SqliteGraphStore::try_new(&conn).unwrap());
    assert_eq!(tree.get_instant(day(2023, 5, 4)).unwrap(), first);
    let sibling = tree.get_instant(day(2023, 5, 5)).unwrap();
    assert_eq!(tree.next(first.id).unwrap(), Some(sibling));
}
