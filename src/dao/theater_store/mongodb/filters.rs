//! Query and update documents shared by the store. Kept free of I/O so the translation from
//! domain predicates to MongoDB operators can be checked without a server.

use mongodb::bson::{Bson, Document, doc};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::models::{CONTENT_COLLECTION, DAY_COLLECTION, to_bson_datetime, to_bson_uuid};
use crate::{
    dao::models::ScreeningSearch,
    state::lifecycle::{LifecycleWindows, ScheduleField, TransitionEdge},
};

/// Screenings that may take `edge` at `now`: the source status plus the edge's time bounds.
pub fn transition_filter(edge: TransitionEdge, now: OffsetDateTime, windows: LifecycleWindows) -> Document {
    let condition = edge.condition(now, windows);
    let field = match condition.field {
        ScheduleField::StartAt => "start_at",
        ScheduleField::EndAt => "end_at",
    };
    let mut bounds = doc! { "$lte": to_bson_datetime(condition.until) };
    if let Some(after) = condition.after {
        bounds.insert("$gt", to_bson_datetime(after));
    }
    let mut filter = doc! { "status": edge.from_status().as_str() };
    filter.insert(field, bounds);
    filter
}

pub fn transition_update(edge: TransitionEdge) -> Document {
    doc! { "$set": { "status": edge.to_status().as_str() } }
}

/// Closed, uncredited sessions that settled before `left_before` and lasted `min_watch`.
pub fn creditable_filter(left_before: OffsetDateTime, min_watch: Duration) -> Document {
    let min_watch_ms = i64::try_from(min_watch.whole_milliseconds()).unwrap_or(i64::MAX);
    doc! {
        "view_counted": false,
        "left_at": { "$ne": Bson::Null, "$lte": to_bson_datetime(left_before) },
        "$expr": {
            "$gte": [ { "$subtract": ["$left_at", "$entered_at"] }, min_watch_ms ]
        },
    }
}

/// Matches the session only while it is closed and still uncredited.
pub fn credit_claim_filter(session_id: Uuid) -> Document {
    doc! {
        "_id": to_bson_uuid(session_id),
        "view_counted": false,
        "left_at": { "$ne": Bson::Null },
    }
}

pub fn credit_claim_update() -> Document {
    doc! { "$set": { "view_counted": true } }
}

pub fn view_increment() -> Document {
    doc! { "$inc": { "total_view": 1_i64, "month_view": 1_i64 } }
}

/// Aggregation behind the schedule search.
///
/// Screenings are joined with their day (dropping unlocked ones) and their content (for the
/// title ordering), then split into the requested page and the total match count.
pub fn search_pipeline(search: &ScreeningSearch) -> Vec<Document> {
    let mut matcher = Document::new();
    if let Some(owner_id) = search.owner_id {
        matcher.insert("owner_id", to_bson_uuid(owner_id));
    }
    if let Some((from, until)) = search.range {
        matcher.insert("start_at", doc! { "$lt": to_bson_datetime(until) });
        matcher.insert("end_at", doc! { "$gt": to_bson_datetime(from) });
    }

    let skip = i64::try_from(search.offset()).unwrap_or(i64::MAX);
    let limit = i64::try_from(search.size.max(1)).unwrap_or(i64::MAX);

    vec![
        doc! { "$match": matcher },
        doc! { "$lookup": {
            "from": DAY_COLLECTION,
            "localField": "day_id",
            "foreignField": "_id",
            "as": "day",
        } },
        doc! { "$match": { "day.locked": true } },
        doc! { "$lookup": {
            "from": CONTENT_COLLECTION,
            "localField": "content_id",
            "foreignField": "_id",
            "as": "content",
        } },
        doc! { "$set": { "content_title": { "$ifNull": [ { "$first": "$content.title" }, "" ] } } },
        doc! { "$facet": {
            "items": [
                { "$sort": { "content_title": 1, "start_at": 1, "_id": 1 } },
                { "$skip": skip },
                { "$limit": limit },
                { "$project": { "day": 0, "content": 0, "content_title": 0 } },
            ],
            "total": [ { "$count": "count" } ],
        } },
    ]
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const NOW: OffsetDateTime = datetime!(2025-03-01 20:00 UTC);

    #[test]
    fn open_edge_bounds_start_at_on_both_sides() {
        let filter = transition_filter(TransitionEdge::Open, NOW, LifecycleWindows::default());
        assert_eq!(
            filter,
            doc! {
                "status": "CLOSED",
                "start_at": {
                    "$lte": to_bson_datetime(datetime!(2025-03-01 20:10 UTC)),
                    "$gt": to_bson_datetime(NOW),
                },
            }
        );
    }

    #[test]
    fn start_edge_only_caps_start_at() {
        let filter = transition_filter(TransitionEdge::Start, NOW, LifecycleWindows::default());
        assert_eq!(
            filter,
            doc! { "status": "WAITING", "start_at": { "$lte": to_bson_datetime(NOW) } }
        );
        assert_eq!(
            transition_update(TransitionEdge::Start),
            doc! { "$set": { "status": "PLAYING" } }
        );
    }

    #[test]
    fn close_edge_waits_out_the_grace_period() {
        let windows = LifecycleWindows {
            preroll: Duration::minutes(10),
            closing_grace: Duration::minutes(3),
        };
        let filter = transition_filter(TransitionEdge::Close, NOW, windows);
        assert_eq!(
            filter,
            doc! {
                "status": "ENDING",
                "end_at": { "$lte": to_bson_datetime(datetime!(2025-03-01 19:57 UTC)) },
            }
        );
    }

    #[test]
    fn sweep_filter_compares_stay_length_in_milliseconds() {
        let filter = creditable_filter(NOW, Duration::minutes(5));
        assert_eq!(
            filter,
            doc! {
                "view_counted": false,
                "left_at": { "$ne": Bson::Null, "$lte": to_bson_datetime(NOW) },
                "$expr": {
                    "$gte": [ { "$subtract": ["$left_at", "$entered_at"] }, 300_000_i64 ]
                },
            }
        );
    }

    #[test]
    fn credit_claim_requires_a_closed_uncredited_session() {
        let id = Uuid::new_v4();
        let filter = credit_claim_filter(id);
        assert!(!filter.get_bool("view_counted").unwrap());
        assert_eq!(
            filter.get_document("left_at").unwrap(),
            &doc! { "$ne": Bson::Null }
        );
        assert_eq!(
            view_increment(),
            doc! { "$inc": { "total_view": 1_i64, "month_view": 1_i64 } }
        );
    }

    #[test]
    fn search_pipeline_pages_locked_screenings() {
        let owner_id = Uuid::new_v4();
        let search = ScreeningSearch {
            owner_id: Some(owner_id),
            range: Some((NOW, datetime!(2025-03-02 00:00 UTC))),
            page: 2,
            size: 10,
        };
        let pipeline = search_pipeline(&search);

        assert_eq!(
            pipeline[0],
            doc! { "$match": {
                "owner_id": to_bson_uuid(owner_id),
                "start_at": { "$lt": to_bson_datetime(datetime!(2025-03-02 00:00 UTC)) },
                "end_at": { "$gt": to_bson_datetime(NOW) },
            } }
        );
        assert_eq!(pipeline[2], doc! { "$match": { "day.locked": true } });

        let items = pipeline[5]
            .get_document("$facet")
            .unwrap()
            .get_array("items")
            .unwrap();
        assert_eq!(items[1], Bson::Document(doc! { "$skip": 20_i64 }));
        assert_eq!(items[2], Bson::Document(doc! { "$limit": 10_i64 }));
    }

    #[test]
    fn unfiltered_search_matches_everything_before_the_join() {
        let pipeline = search_pipeline(&ScreeningSearch::default());
        assert_eq!(pipeline[0], doc! { "$match": {} });
    }
}
