//! SQL shared by working copies and read handles.

use rusqlite::{params, Connection, OptionalExtension, Row};
use timetable_core::{DayClass, RouteNumber, TransportKind};

use crate::rows::{
    CategoryCounts, CategoryId, CategoryRow, RouteDump, RouteId, RouteRow, SlotRow,
    SnapshotDump, StationDump, StationId, StationRow,
};
use crate::StoreError;

fn corrupt(table: &'static str, message: String) -> StoreError {
    StoreError::Corrupt { table, message }
}

fn route_number(table: &'static str, raw: i64) -> Result<RouteNumber, StoreError> {
    u32::try_from(raw)
        .map(RouteNumber)
        .map_err(|_| corrupt(table, format!("route number {raw} out of range")))
}

pub(crate) fn category_id(
    conn: &Connection,
    kind: TransportKind,
) -> Result<Option<CategoryId>, StoreError> {
    let id = conn
        .prepare_cached("SELECT id FROM Category WHERE kind = ?1")?
        .query_row(params![kind.as_str()], |row| row.get::<_, i64>(0))
        .optional()?;
    Ok(id.map(CategoryId))
}

pub(crate) fn route_id(
    conn: &Connection,
    category: CategoryId,
    number: RouteNumber,
) -> Result<Option<RouteId>, StoreError> {
    let id = conn
        .prepare_cached("SELECT id FROM Bus WHERE nameCategory_id = ?1 AND numBus = ?2")?
        .query_row(params![category.0, number.0], |row| row.get::<_, i64>(0))
        .optional()?;
    Ok(id.map(RouteId))
}

pub(crate) fn categories(conn: &Connection) -> Result<Vec<CategoryRow>, StoreError> {
    let mut stmt = conn.prepare_cached("SELECT id, kind, nameCategory FROM Category ORDER BY id")?;
    let raw = stmt
        .query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(id, kind, name)| {
            let kind = kind
                .parse::<TransportKind>()
                .map_err(|e| corrupt("Category", e.to_string()))?;
            Ok(CategoryRow {
                id: CategoryId(id),
                kind,
                name,
            })
        })
        .collect()
}

pub(crate) fn routes(conn: &Connection) -> Result<Vec<RouteRow>, StoreError> {
    let mut stmt = conn.prepare_cached("SELECT id, nameCategory_id, numBus FROM Bus ORDER BY id")?;
    let raw = stmt
        .query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(id, category, number)| {
            Ok(RouteRow {
                id: RouteId(id),
                category_id: CategoryId(category),
                number: route_number("Bus", number)?,
            })
        })
        .collect()
}

fn station_row(row: &Row<'_>) -> rusqlite::Result<StationRow> {
    Ok(StationRow {
        id: StationId(row.get(0)?),
        route_id: RouteId(row.get(1)?),
        name: row.get(2)?,
        path: row.get(3)?,
        link: row.get(4)?,
    })
}

pub(crate) fn stations_for_route(
    conn: &Connection,
    route: RouteId,
) -> Result<Vec<StationRow>, StoreError> {
    let rows = conn
        .prepare_cached(
            "SELECT id, Bus_id, station, path, link FROM Station WHERE Bus_id = ?1 ORDER BY id",
        )?
        .query_map(params![route.0], station_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn all_stations(conn: &Connection) -> Result<Vec<StationRow>, StoreError> {
    let rows = conn
        .prepare_cached("SELECT id, Bus_id, station, path, link FROM Station ORDER BY id")?
        .query_map([], station_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn time_slots_for_station(
    conn: &Connection,
    station: StationId,
) -> Result<Vec<SlotRow>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, day, hour, time FROM BusTime WHERE Station_id = ?1 ORDER BY id",
    )?;
    let raw = stmt
        .query_map(params![station.0], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(id, day, hour, minutes)| {
            let day = DayClass::from_label(&day)
                .ok_or_else(|| corrupt("BusTime", format!("unknown day '{day}'")))?;
            Ok(SlotRow {
                id,
                station_id: station,
                day,
                hour,
                minutes,
            })
        })
        .collect()
}

pub(crate) fn route_dump(conn: &Connection, route: RouteRow) -> Result<RouteDump, StoreError> {
    let mut stations = Vec::new();
    for station in stations_for_route(conn, route.id)? {
        let time_slots = time_slots_for_station(conn, station.id)?;
        stations.push(StationDump {
            station,
            time_slots,
        });
    }
    Ok(RouteDump { route, stations })
}

pub(crate) fn find_route_dump(
    conn: &Connection,
    kind: TransportKind,
    number: RouteNumber,
) -> Result<Option<RouteDump>, StoreError> {
    let Some(category) = category_id(conn, kind)? else {
        return Ok(None);
    };
    let Some(id) = route_id(conn, category, number)? else {
        return Ok(None);
    };
    route_dump(
        conn,
        RouteRow {
            id,
            category_id: category,
            number,
        },
    )
    .map(Some)
}

pub(crate) fn dump(conn: &Connection) -> Result<SnapshotDump, StoreError> {
    let categories = categories(conn)?;
    let mut routes_out = Vec::new();
    for route in routes(conn)? {
        routes_out.push(route_dump(conn, route)?);
    }
    Ok(SnapshotDump {
        categories,
        routes: routes_out,
    })
}

pub(crate) fn counts(conn: &Connection) -> Result<Vec<CategoryCounts>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT c.kind, c.nameCategory,
                COUNT(DISTINCT b.id), COUNT(DISTINCT s.id), COUNT(t.id)
         FROM Category c
         LEFT JOIN Bus b ON b.nameCategory_id = c.id
         LEFT JOIN Station s ON s.Bus_id = b.id
         LEFT JOIN BusTime t ON t.Station_id = s.id
         GROUP BY c.id
         ORDER BY c.id",
    )?;
    let raw = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(kind, name, routes, stations, time_slots)| {
            let kind = kind
                .parse::<TransportKind>()
                .map_err(|e| corrupt("Category", e.to_string()))?;
            Ok(CategoryCounts {
                kind,
                name,
                routes: routes.max(0) as u64,
                stations: stations.max(0) as u64,
                time_slots: time_slots.max(0) as u64,
            })
        })
        .collect()
}
