//! Grid column id -> backing column lookup table.
//!
//! The grid identifies columns by stable string ids; the backing store sorts
//! by column names or expressions. [`SortFieldTable`] is the exhaustive
//! mapping between the two. Columns the grid can display but the store cannot
//! order by (computed values, icon lists, ...) map to [`SqlField::Unsortable`],
//! as does any id the table does not know.

/// Backing-store side of a sortable grid column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlField {
    /// Column name or SQL expression usable in `ORDER BY`.
    Column(&'static str),
    /// The grid column exists but cannot be ordered by in the store.
    Unsortable,
}

/// Static, immutable mapping from grid column ids to [`SqlField`]s.
#[derive(Debug, Clone, Copy)]
pub struct SortFieldTable {
    entries: &'static [(&'static str, SqlField)],
}

impl SortFieldTable {
    #[must_use]
    pub const fn new(entries: &'static [(&'static str, SqlField)]) -> Self {
        Self { entries }
    }

    /// The tour-book column table.
    #[must_use]
    pub const fn tour_book() -> Self {
        Self::new(TOUR_BOOK_SORT_FIELDS)
    }

    /// Looks up a grid column id. Unknown ids are reported as unsortable.
    #[must_use]
    pub fn lookup(&self, field_id: &str) -> SqlField {
        self.entries
            .iter()
            .find(|(id, _)| *id == field_id)
            .map_or(SqlField::Unsortable, |(_, field)| *field)
    }

    /// Whether the table has an entry (sortable or not) for `field_id`.
    #[must_use]
    pub fn contains(&self, field_id: &str) -> bool {
        self.entries.iter().any(|(id, _)| *id == field_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&'static str, SqlField)> {
        self.entries.iter().copied()
    }
}

impl Default for SortFieldTable {
    fn default() -> Self {
        Self::tour_book()
    }
}

use SqlField::{Column, Unsortable};

/// Tour-book grid columns. Entries grouped as in the column chooser.
pub static TOUR_BOOK_SORT_FIELDS: &[(&str, SqlField)] = &[
    // indexed
    ("TIME_DATE", Column("TourStartTime")),
    // there is no date-only column, start time alone cannot be ordered by
    ("TIME_TOUR_START_TIME", Unsortable),
    ("TOUR_TITLE", Column("TourTitle")),
    ("DATA_IMPORT_FILE_NAME", Column("TourImportFileName")),
    ("TIME_WEEK_NO", Column("StartWeek")),
    ("TIME_WEEKYEAR", Column("StartWeekYear")),
    // body
    ("BODY_AVG_PULSE", Column("avgPulse")),
    ("BODY_CALORIES", Column("calories")),
    ("BODY_PULSE_MAX", Column("maxPulse")),
    ("BODY_PERSON", Column("tourPerson_personId")),
    ("BODY_RESTPULSE", Column("restPulse")),
    ("BODY_WEIGHT", Column("bikerWeight")),
    // data
    ("DATA_DP_TOLERANCE", Column("dpTolerance")),
    ("DATA_IMPORT_FILE_PATH", Column("tourImportFilePath")),
    ("DATA_NUM_TIME_SLICES", Column("numberOfTimeSlices")),
    ("DATA_TIME_INTERVAL", Column("deviceTimeInterval")),
    // device
    ("DEVICE_DISTANCE", Column("startDistance")),
    ("DEVICE_NAME", Column("devicePluginName")),
    // elevation
    ("ALTITUDE_AVG_CHANGE", Column("avgAltitudeChange")),
    ("ALTITUDE_MAX", Column("maxAltitude")),
    ("ALTITUDE_SUMMARIZED_BORDER_DOWN", Column("tourAltDown")),
    ("ALTITUDE_SUMMARIZED_BORDER_UP", Column("tourAltUp")),
    // motion
    ("MOTION_AVG_PACE", Unsortable),
    ("MOTION_AVG_SPEED", Unsortable),
    ("MOTION_DISTANCE", Column("tourDistance")),
    ("MOTION_MAX_SPEED", Column("maxSpeed")),
    // power
    ("POWER_AVG", Column("power_Avg")),
    ("POWER_MAX", Column("power_Max")),
    ("POWER_NORMALIZED", Column("power_Normalized")),
    ("POWER_TOTAL_WORK", Column("power_TotalWork")),
    // powertrain
    ("POWERTRAIN_AVG_CADENCE", Column("avgCadence")),
    ("POWERTRAIN_AVG_LEFT_PEDAL_SMOOTHNESS", Column("power_AvgLeftPedalSmoothness")),
    ("POWERTRAIN_AVG_LEFT_TORQUE_EFFECTIVENESS", Column("power_AvgLeftTorqueEffectiveness")),
    ("POWERTRAIN_AVG_RIGHT_PEDAL_SMOOTHNESS", Column("power_AvgRightPedalSmoothness")),
    ("POWERTRAIN_AVG_RIGHT_TORQUE_EFFECTIVENESS", Column("power_AvgRightTorqueEffectiveness")),
    ("POWERTRAIN_CADENCE_MULTIPLIER", Column("cadenceMultiplier")),
    ("POWERTRAIN_GEAR_FRONT_SHIFT_COUNT", Column("frontShiftCount")),
    ("POWERTRAIN_GEAR_REAR_SHIFT_COUNT", Column("rearShiftCount")),
    ("POWERTRAIN_PEDAL_LEFT_RIGHT_BALANCE", Column("power_PedalLeftRightBalance")),
    ("POWERTRAIN_SLOW_VS_FAST_CADENCE_PERCENTAGES", Unsortable),
    ("POWERTRAIN_SLOW_VS_FAST_CADENCE_ZONES_DELIMITER", Unsortable),
    // running dynamics
    ("RUN_DYN_STANCE_TIME_AVG", Column("runDyn_StanceTime_Avg")),
    ("RUN_DYN_STANCE_TIME_MIN", Column("runDyn_StanceTime_Min")),
    ("RUN_DYN_STANCE_TIME_MAX", Column("runDyn_StanceTime_Max")),
    ("RUN_DYN_STANCE_TIME_BALANCE_AVG", Column("runDyn_StanceTimeBalance_Avg")),
    ("RUN_DYN_STANCE_TIME_BALANCE_MIN", Column("runDyn_StanceTimeBalance_Min")),
    ("RUN_DYN_STANCE_TIME_BALANCE_MAX", Column("runDyn_StanceTimeBalance_Max")),
    ("RUN_DYN_STEP_LENGTH_AVG", Column("runDyn_StepLength_Avg")),
    ("RUN_DYN_STEP_LENGTH_MIN", Column("runDyn_StepLength_Min")),
    ("RUN_DYN_STEP_LENGTH_MAX", Column("runDyn_StepLength_Max")),
    ("RUN_DYN_VERTICAL_OSCILLATION_AVG", Column("runDyn_VerticalOscillation_Avg")),
    ("RUN_DYN_VERTICAL_OSCILLATION_MIN", Column("runDyn_VerticalOscillation_Min")),
    ("RUN_DYN_VERTICAL_OSCILLATION_MAX", Column("runDyn_VerticalOscillation_Max")),
    ("RUN_DYN_VERTICAL_RATIO_AVG", Column("runDyn_VerticalRatio_Avg")),
    ("RUN_DYN_VERTICAL_RATIO_MIN", Column("runDyn_VerticalRatio_Min")),
    ("RUN_DYN_VERTICAL_RATIO_MAX", Column("runDyn_VerticalRatio_Max")),
    // surfing
    ("SURFING_MIN_DISTANCE", Column("surfing_MinDistance")),
    ("SURFING_MIN_SPEED_START_STOP", Column("surfing_MinSpeed_StartStop")),
    ("SURFING_MIN_SPEED_SURFING", Column("surfing_MinSpeed_Surfing")),
    ("SURFING_MIN_TIME_DURATION", Column("surfing_MinTimeDuration")),
    ("SURFING_NUMBER_OF_EVENTS", Column("surfing_NumberOfEvents")),
    // time
    ("TIME_DRIVING_TIME", Column("tourDrivingTime")),
    ("TIME_PAUSED_TIME", Unsortable),
    ("TIME_PAUSED_TIME_RELATIVE", Unsortable),
    ("TIME_RECORDING_TIME", Column("tourRecordingTime")),
    ("TIME_TIME_ZONE", Column("TimeZoneId")),
    ("TIME_TIME_ZONE_DIFFERENCE", Unsortable),
    ("TIME_WEEK_DAY", Unsortable),
    // tour
    ("TOUR_LOCATION_START", Column("tourStartPlace")),
    ("TOUR_LOCATION_END", Column("tourEndPlace")),
    ("TOUR_NUM_MARKERS", Unsortable),
    ("TOUR_NUM_PHOTOS", Unsortable),
    ("TOUR_TAGS", Unsortable),
    // rendered as an icon, ordered by the type id
    ("TOUR_TYPE", Column("tourType_typeId")),
    ("TOUR_TYPE_TEXT", Unsortable),
    // training
    ("TRAINING_EFFECT_AEROB", Column("training_TrainingEffect_Aerob")),
    ("TRAINING_EFFECT_ANAEROB", Column("training_TrainingEffect_Anaerob")),
    ("TRAINING_FTP", Column("power_FTP")),
    ("TRAINING_INTENSITY_FACTOR", Column("power_IntensityFactor")),
    ("TRAINING_POWER_TO_WEIGHT", Unsortable),
    ("TRAINING_STRESS_SCORE", Column("power_TrainingStressScore")),
    ("TRAINING_PERFORMANCE_LEVEL", Column("training_TrainingPerformance")),
    // weather
    ("WEATHER_CLOUDS", Column("weatherClouds")),
    ("WEATHER_TEMPERATURE_AVG", Column("(CAST(avgTemperature AS REAL) / temperatureScale)")),
    ("WEATHER_TEMPERATURE_MIN", Column("weather_Temperature_Min")),
    ("WEATHER_TEMPERATURE_MAX", Column("weather_Temperature_Max")),
    ("WEATHER_WIND_DIR", Column("weatherWindDir")),
    ("WEATHER_WIND_SPEED", Column("weatherWindSpd")),
];
