
#[cfg(test)]
mod encoding_tests {
    use super::test_utils::shared::*;
    use cairn_rs::constraint::{
        self, contained_by, contained_in, contains_all, contains_string, does_not_exist,
        does_not_match_key_in_query, does_not_match_query, equal_to, equal_to_object, exists,
        greater_than, greater_than_or_equal_to, has_prefix, has_suffix, less_than,
        less_than_or_equal_to, matches_key_in_query, matches_query, matches_regex, matches_text,
        not_contained_in, not_equal_to, polygon_contains, related, relative, within_geo_box,
        within_kilometers, within_miles, within_polygon, within_radians,
    };
    use cairn_rs::{CairnGeoPoint, CairnPolygon, Order, Pointer, Query};
    use serde_json::{json, Value};

    fn where_of(query: &Query<GameScore>) -> Value {
        let body = serde_json::to_value(query).expect("query failed to serialize");
        body["where"].clone()
    }

    fn geopoint(latitude: f64, longitude: f64) -> CairnGeoPoint {
        CairnGeoPoint::new(latitude, longitude).expect("valid geopoint")
    }

    #[test]
    fn test_equality_is_direct_and_comparisons_are_wrapped() {
        let query = Query::<GameScore>::new()
            .filter(equal_to("playerName", "Ann"))
            .filter(less_than("score", 10))
            .filter(less_than_or_equal_to("rank", 3))
            .filter(greater_than("wins", 0))
            .filter(greater_than_or_equal_to("losses", 2))
            .filter(not_equal_to("cheatMode", true));
        assert_eq!(
            where_of(&query),
            json!({
                "playerName": "Ann",
                "score": {"$lt": 10},
                "rank": {"$lte": 3},
                "wins": {"$gt": 0},
                "losses": {"$gte": 2},
                "cheatMode": {"$ne": true},
            })
        );
    }

    #[test]
    fn test_equality_on_object_encodes_a_pointer() {
        let owner = saved_score("xWMyZ4YEGZ", 10, "Ann");
        let query = Query::<GameScore>::new()
            .filter(equal_to_object("opponent", &owner).expect("object has an id"));
        assert_eq!(
            where_of(&query),
            json!({
                "opponent": {
                    "__type": "Pointer",
                    "className": "GameScore",
                    "objectId": "xWMyZ4YEGZ",
                }
            })
        );
    }

    #[test]
    fn test_array_operators() {
        let query = Query::<GameScore>::new()
            .filter(contained_in("score", &[1, 3, 5]))
            .filter(not_contained_in("playerName", &["Ann", "Ben"]))
            .filter(contains_all("skills", &["flying", "kungfu"]))
            .filter(contained_by("badges", &["gold", "silver", "bronze"]));
        assert_eq!(
            where_of(&query),
            json!({
                "score": {"$in": [1, 3, 5]},
                "playerName": {"$nin": ["Ann", "Ben"]},
                "skills": {"$all": ["flying", "kungfu"]},
                "badges": {"$containedBy": ["gold", "silver", "bronze"]},
            })
        );
    }

    #[test]
    fn test_existence_operators() {
        let query = Query::<GameScore>::new()
            .filter(exists("score"))
            .filter(does_not_exist("deletedAt"));
        assert_eq!(
            where_of(&query),
            json!({
                "score": {"$exists": true},
                "deletedAt": {"$exists": false},
            })
        );
    }

    #[test]
    fn test_regex_and_options_travel_together() {
        let bare = Query::<GameScore>::new().filter(matches_regex("playerName", "^A.*n$", None));
        assert_eq!(where_of(&bare), json!({"playerName": {"$regex": "^A.*n$"}}));

        let with_options =
            Query::<GameScore>::new().filter(matches_regex("playerName", "^a.*n$", Some("i")));
        assert_eq!(
            where_of(&with_options),
            json!({"playerName": {"$regex": "^a.*n$", "$options": "i"}})
        );
    }

    #[test]
    fn test_string_matchers_quote_the_operand() {
        let query = Query::<GameScore>::new().filter(contains_string("bio", "c++ (games)", None));
        assert_eq!(
            where_of(&query),
            json!({"bio": {"$regex": "\\Qc++ (games)\\E"}})
        );

        let prefixed = Query::<GameScore>::new().filter(has_prefix("playerName", "An", None));
        assert_eq!(
            where_of(&prefixed),
            json!({"playerName": {"$regex": "^\\QAn\\E"}})
        );

        let suffixed = Query::<GameScore>::new().filter(has_suffix("playerName", "nn", Some("i")));
        assert_eq!(
            where_of(&suffixed),
            json!({"playerName": {"$regex": "\\Qnn\\E$", "$options": "i"}})
        );
    }

    #[test]
    fn test_full_text_search() {
        let query = Query::<GameScore>::new().filter(matches_text("bio", "climbing"));
        assert_eq!(
            where_of(&query),
            json!({"bio": {"$text": {"$search": {"$term": "climbing"}}}})
        );
    }

    #[test]
    fn test_keyed_subqueries_carry_query_and_key() {
        let teams = Query::<TestUser>::new().filter(equal_to("winPct", 1));
        let query = Query::<GameScore>::new()
            .filter(matches_key_in_query("playerName", "username", &teams))
            .filter(does_not_match_key_in_query("loserName", "username", &teams));
        assert_eq!(
            where_of(&query),
            json!({
                "playerName": {
                    "$select": {
                        "query": {"where": {"winPct": 1}, "className": "_User"},
                        "key": "username",
                    }
                },
                "loserName": {
                    "$dontSelect": {
                        "query": {"where": {"winPct": 1}, "className": "_User"},
                        "key": "username",
                    }
                },
            })
        );
    }

    #[test]
    fn test_pointer_subqueries_inline_the_where() {
        let users = Query::<TestUser>::new().filter(exists("email"));
        let query = Query::<GameScore>::new()
            .filter(matches_query("player", &users))
            .filter(does_not_match_query("banned", &users));
        assert_eq!(
            where_of(&query),
            json!({
                "player": {
                    "$inQuery": {"where": {"email": {"$exists": true}}, "className": "_User"}
                },
                "banned": {
                    "$notInQuery": {"where": {"email": {"$exists": true}}, "className": "_User"}
                },
            })
        );
    }

    #[test]
    fn test_compound_operators_take_where_lists() {
        let few = Query::<GameScore>::new().filter(less_than("score", 10));
        let many = Query::<GameScore>::new().filter(greater_than("score", 1000));
        let query = Query::<GameScore>::new().filter(constraint::or(&[few.clone(), many.clone()]));
        assert_eq!(
            where_of(&query),
            json!({
                "$or": [
                    {"score": {"$lt": 10}},
                    {"score": {"$gt": 1000}},
                ]
            })
        );

        let query = Query::<GameScore>::new().filter(constraint::nor(&[few.clone(), many.clone()]));
        assert_eq!(where_of(&query)["$nor"].as_array().map(Vec::len), Some(2));

        let query = Query::<GameScore>::new().filter(constraint::and(&[few, many]));
        assert_eq!(where_of(&query)["$and"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_related_to_names_the_relation_and_the_owner() {
        let owner: Pointer<TestUser> = Pointer::new("xWMyZ4YEGZ");
        let query = Query::<GameScore>::new().filter(related("likes", &owner));
        assert_eq!(
            where_of(&query),
            json!({
                "$relatedTo": {
                    "key": "likes",
                    "object": {
                        "__type": "Pointer",
                        "className": "_User",
                        "objectId": "xWMyZ4YEGZ",
                    },
                }
            })
        );
    }

    #[test]
    fn test_relative_time_wraps_the_comparison_value() {
        let query = Query::<GameScore>::new()
            .filter(relative(greater_than("createdAt", "3 days ago")))
            .filter(relative(less_than_or_equal_to("updatedAt", "in 1 hour")));
        assert_eq!(
            where_of(&query),
            json!({
                "createdAt": {"$gt": {"$relativeTime": "3 days ago"}},
                "updatedAt": {"$lte": {"$relativeTime": "in 1 hour"}},
            })
        );
    }

    #[test]
    fn test_near_sorts_by_distance() {
        let home = geopoint(40.0, -30.0);
        let query = Query::<GameScore>::new().filter(constraint::near("location", &home));
        assert_eq!(
            where_of(&query),
            json!({
                "location": {
                    "$nearSphere": {"__type": "GeoPoint", "latitude": 40.0, "longitude": -30.0}
                }
            })
        );
    }

    #[test]
    fn test_sorted_radius_pairs_near_sphere_with_max_distance() {
        let home = geopoint(40.0, -30.0);
        let query = Query::<GameScore>::new()
            .filter_all(within_radians("location", &home, 0.5, true));
        assert_eq!(
            where_of(&query),
            json!({
                "location": {
                    "$nearSphere": {"__type": "GeoPoint", "latitude": 40.0, "longitude": -30.0},
                    "$maxDistance": 0.5,
                }
            })
        );
    }

    #[test]
    fn test_unsorted_radius_emits_the_flat_center_sphere_pair() {
        let home = geopoint(40.0, -30.0);
        let query = Query::<GameScore>::new()
            .filter_all(within_radians("location", &home, 0.5, false));
        assert_eq!(
            where_of(&query),
            json!({
                "location": {
                    "$centerSphere": {"__type": "GeoPoint", "latitude": 40.0, "longitude": -30.0},
                    "$geoWithin": 0.5,
                }
            })
        );
    }

    #[test]
    fn test_mile_and_kilometer_distances_scale_by_earth_radius() {
        let home = geopoint(40.0, -30.0);
        let miles = Query::<GameScore>::new()
            .filter_all(within_miles("location", &home, 10.0, true));
        assert_eq!(
            where_of(&miles)["location"]["$maxDistance"],
            json!(10.0 / 3958.8)
        );

        let kilometers = Query::<GameScore>::new()
            .filter_all(within_kilometers("location", &home, 10.0, true));
        assert_eq!(
            where_of(&kilometers)["location"]["$maxDistance"],
            json!(10.0 / 6371.0)
        );
    }

    #[test]
    fn test_geo_box_takes_southwest_then_northeast() {
        let southwest = geopoint(37.7, -122.5);
        let northeast = geopoint(37.8, -122.4);
        let query = Query::<GameScore>::new()
            .filter(within_geo_box("location", &southwest, &northeast));
        assert_eq!(
            where_of(&query),
            json!({
                "location": {
                    "$within": {
                        "$box": [
                            {"__type": "GeoPoint", "latitude": 37.7, "longitude": -122.5},
                            {"__type": "GeoPoint", "latitude": 37.8, "longitude": -122.4},
                        ]
                    }
                }
            })
        );
    }

    #[test]
    fn test_polygon_vertices_encode_latitude_first() {
        let polygon = CairnPolygon::new(vec![
            geopoint(0.0, 0.0),
            geopoint(0.0, 10.0),
            geopoint(10.0, 10.0),
            geopoint(10.0, 0.0),
        ])
        .expect("valid polygon");
        let query = Query::<GameScore>::new().filter(within_polygon("location", &polygon));
        assert_eq!(
            where_of(&query),
            json!({
                "location": {
                    "$geoWithin": {
                        "$polygon": [[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0]]
                    }
                }
            })
        );
    }

    #[test]
    fn test_polygon_contains_wraps_the_point() {
        let point = geopoint(5.0, 5.0);
        let query = Query::<GameScore>::new().filter(polygon_contains("bounds", &point));
        assert_eq!(
            where_of(&query),
            json!({
                "bounds": {
                    "$geoIntersects": {
                        "$point": {"__type": "GeoPoint", "latitude": 5.0, "longitude": 5.0}
                    }
                }
            })
        );
    }

    #[test]
    fn test_operators_on_one_key_merge_and_direct_values_win() {
        let ranged = Query::<GameScore>::new()
            .filter(greater_than_or_equal_to("score", 10))
            .filter(less_than("score", 100));
        assert_eq!(
            where_of(&ranged),
            json!({"score": {"$gte": 10, "$lt": 100}})
        );

        let repeated = Query::<GameScore>::new()
            .filter(greater_than("score", 10))
            .filter(greater_than("score", 20));
        assert_eq!(where_of(&repeated), json!({"score": {"$gt": 20}}));

        let overridden = Query::<GameScore>::new()
            .filter(greater_than("score", 10))
            .filter(equal_to("score", 42));
        assert_eq!(where_of(&overridden), json!({"score": 42}));
    }

    #[test]
    fn test_body_defaults_and_builders_land_in_the_body() {
        let plain = Query::<GameScore>::new();
        assert_eq!(
            serde_json::to_value(&plain).expect("query failed to serialize"),
            json!({"limit": 100, "skip": 0, "_method": "GET", "where": {}})
        );

        let tuned = Query::<GameScore>::new()
            .limit(25)
            .skip(50)
            .order(&[Order::descending("score"), Order::ascending("playerName")])
            .include(&["player"])
            .include(&["opponent"])
            .select(&["score", "playerName"])
            .exclude(&["secret"])
            .hint(json!({"_id_": 1}))
            .read_preference("SECONDARY")
            .include_read_preference("SECONDARY_PREFERRED")
            .subquery_read_preference("NEAREST");
        assert_eq!(
            serde_json::to_value(&tuned).expect("query failed to serialize"),
            json!({
                "limit": 25,
                "skip": 50,
                "_method": "GET",
                "where": {},
                "order": ["-score", "playerName"],
                "include": ["opponent", "player"],
                "keys": ["playerName", "score"],
                "excludeKeys": ["secret"],
                "readPreference": "SECONDARY",
                "includeReadPreference": "SECONDARY_PREFERRED",
                "subqueryReadPreference": "NEAREST",
                "hint": {"_id_": 1},
            })
        );

        let starred = Query::<GameScore>::new().include(&["player"]).include_all();
        let body = serde_json::to_value(&starred).expect("query failed to serialize");
        assert_eq!(body["include"], json!(["*", "player"]));
    }
}
