// Kept in sync with `migrations/` by hand.

diesel::table! {
    operators (id) {
        id -> Text,
        name -> Text,
    }
}

diesel::table! {
    lines (id) {
        id -> Text,
        name -> Text,
        public_code -> Text,
        private_code -> Text,
        transport_mode -> Text,
        transport_submode -> Nullable<Text>,
        operator_ref -> Nullable<Text>,
    }
}

diesel::table! {
    routes (id) {
        id -> Text,
        line_ref -> Text,
        name -> Nullable<Text>,
        direction -> Nullable<Text>,
    }
}

diesel::table! {
    journey_patterns (id) {
        id -> Text,
        route_ref -> Text,
        name -> Nullable<Text>,
    }
}

diesel::table! {
    journey_pattern_stop_points (id) {
        id -> Text,
        journey_pattern_ref -> Text,
        stop_point_ref -> Text,
        sequence_order -> Integer,
        for_boarding -> Bool,
        for_alighting -> Bool,
        destination_display_ref -> Nullable<Text>,
    }
}

diesel::table! {
    journey_pattern_links (id) {
        id -> Text,
        journey_pattern_ref -> Text,
        from_point_ref -> Text,
        to_point_ref -> Text,
        sequence_order -> Integer,
    }
}

diesel::table! {
    destination_displays (id) {
        id -> Text,
        front_text -> Text,
    }
}

diesel::table! {
    stop_points (id) {
        id -> Text,
        name -> Text,
    }
}

diesel::table! {
    stop_places (id) {
        id -> Text,
        name -> Text,
        active -> Bool,
    }
}

diesel::table! {
    stop_quays (id) {
        id -> Text,
        stop_place_ref -> Text,
        public_code -> Nullable<Text>,
    }
}

diesel::table! {
    stop_assignments (stop_point_ref) {
        stop_point_ref -> Text,
        quay_ref -> Text,
    }
}

diesel::table! {
    vehicle_journeys (id) {
        id -> Text,
        name -> Text,
        private_code -> Text,
        journey_pattern_ref -> Text,
        operator_ref -> Nullable<Text>,
    }
}

diesel::table! {
    journey_day_types (service_journey_ref, day_type_ref) {
        service_journey_ref -> Text,
        day_type_ref -> Text,
    }
}

diesel::table! {
    passing_times (service_journey_ref, stop_point_in_pattern_ref) {
        service_journey_ref -> Text,
        stop_point_in_pattern_ref -> Text,
        arrival_time -> Nullable<Time>,
        departure_time -> Nullable<Time>,
    }
}

diesel::table! {
    day_types (id) {
        id -> Text,
        days_of_week -> Nullable<Text>,
    }
}

diesel::table! {
    operating_periods (id) {
        id -> Text,
        from_date -> Date,
        to_date -> Date,
    }
}

diesel::table! {
    day_type_assignments (id) {
        id -> Text,
        day_type_ref -> Text,
        operating_period_ref -> Nullable<Text>,
        date -> Nullable<Date>,
        is_available -> Bool,
    }
}

diesel::table! {
    operating_days (id) {
        id -> Text,
        calendar_date -> Date,
    }
}

diesel::table! {
    dated_service_journeys (id) {
        id -> Text,
        service_journey_ref -> Text,
        operating_day_ref -> Text,
    }
}

diesel::table! {
    calendar (date, day_type_ref) {
        date -> Date,
        day_type_ref -> Text,
    }
}

diesel::table! {
    imports (id) {
        id -> Integer,
        path -> Text,
        fingerprint -> Text,
        version -> Nullable<Text>,
        size -> BigInt,
        files -> Integer,
        available_from -> Nullable<Date>,
        available_to -> Nullable<Date>,
        import_status -> Text,
        message -> Nullable<Text>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    active_journeys (id) {
        id -> Text,
        date -> Date,
        vehicle_journey_ref -> Text,
        line_ref -> Text,
        name -> Text,
        private_code -> Text,
        direction -> Nullable<Text>,
        operator_ref -> Nullable<Text>,
        line_private_code -> Text,
        line_public_code -> Text,
        line_name -> Text,
        transport_mode -> Text,
        transport_submode -> Nullable<Text>,
        first_stop_quay_ref -> Nullable<Text>,
        last_stop_quay_ref -> Nullable<Text>,
        start_at -> Nullable<Timestamp>,
        end_at -> Nullable<Timestamp>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    active_calls (id) {
        id -> Text,
        active_journey_id -> Text,
        line_private_code -> Text,
        destination_display -> Nullable<Text>,
        sequence_order -> Integer,
        stop_quay_ref -> Text,
        stop_place_name -> Text,
        for_alighting -> Bool,
        for_boarding -> Bool,
        call_time -> Timestamp,
        arrival_time -> Nullable<Timestamp>,
        departure_time -> Nullable<Timestamp>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    active_status (date) {
        date -> Date,
        import_id -> Integer,
        journeys -> Nullable<Integer>,
        calls -> Nullable<Integer>,
        status -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::joinable!(active_status -> imports (import_id));

diesel::allow_tables_to_appear_in_same_query!(
    operators,
    lines,
    routes,
    journey_patterns,
    journey_pattern_stop_points,
    journey_pattern_links,
    destination_displays,
    stop_points,
    stop_places,
    stop_quays,
    stop_assignments,
    vehicle_journeys,
    journey_day_types,
    passing_times,
    day_types,
    operating_periods,
    day_type_assignments,
    operating_days,
    dated_service_journeys,
    calendar,
    imports,
    active_journeys,
    active_calls,
    active_status,
);
