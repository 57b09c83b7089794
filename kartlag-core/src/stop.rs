//! Transit stop vocabularies used for popularity scoring.
//!
//! Spellings follow the NeTEx enumerations published by the national stop
//! place registry.

use serde::{Deserialize, Serialize};

vocabulary! {
    /// Physical type of a stop place.
    pub enum StopPlaceType {
        OnstreetBus => "onstreetBus",
        OnstreetTram => "onstreetTram",
        Airport => "airport",
        RailStation => "railStation",
        MetroStation => "metroStation",
        BusStation => "busStation",
        CoachStation => "coachStation",
        TramStation => "tramStation",
        HarbourPort => "harbourPort",
        FerryPort => "ferryPort",
        FerryStop => "ferryStop",
        LiftStation => "liftStation",
        VehicleRailInterchange => "vehicleRailInterchange",
        TaxiRank => "taxiRank",
        Other => "other",
    }
}

vocabulary! {
    /// Transport sub-mode refining a stop place type.
    pub enum SubMode {
        LocalBus => "localBus",
        RegionalBus => "regionalBus",
        ExpressBus => "expressBus",
        NightBus => "nightBus",
        SightseeingBus => "sightseeingBus",
        ShuttleBus => "shuttleBus",
        SchoolBus => "schoolBus",
        RailReplacementBus => "railReplacementBus",
        AirportLinkBus => "airportLinkBus",
        Local => "local",
        HighSpeedRail => "highSpeedRail",
        SuburbanRailway => "suburbanRailway",
        RegionalRail => "regionalRail",
        InterregionalRail => "interregionalRail",
        LongDistance => "longDistance",
        International => "international",
        NightRail => "nightRail",
        TouristRailway => "touristRailway",
        AirportLinkRail => "airportLinkRail",
        Metro => "metro",
        UrbanRailway => "urbanRailway",
        CityTram => "cityTram",
        LocalTram => "localTram",
        DomesticFlight => "domesticFlight",
        InternationalFlight => "internationalFlight",
        HelicopterService => "helicopterService",
        InternationalCarFerry => "internationalCarFerry",
        NationalCarFerry => "nationalCarFerry",
        RegionalCarFerry => "regionalCarFerry",
        LocalCarFerry => "localCarFerry",
        InternationalPassengerFerry => "internationalPassengerFerry",
        LocalPassengerFerry => "localPassengerFerry",
        HighSpeedVehicleService => "highSpeedVehicleService",
        HighSpeedPassengerService => "highSpeedPassengerService",
        SightseeingService => "sightseeingService",
        Telecabin => "telecabin",
        Funicular => "funicular",
    }
}

vocabulary! {
    /// Importance of a stop place as a transfer point.
    pub enum InterchangeWeighting {
        NoInterchange => "noInterchange",
        InterchangeAllowed => "interchangeAllowed",
        RecommendedInterchange => "recommendedInterchange",
        PreferredInterchange => "preferredInterchange",
    }
}

/// One `(stop type, sub-mode)` pair contributing to a stop's popularity.
///
/// Either half may be absent; scoring treats a missing type as contributing
/// nothing and a missing sub-mode as "use the type's wildcard factor".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StopMode {
    /// Stop place type, if known.
    pub stop_type: Option<StopPlaceType>,
    /// Sub-mode, if known.
    pub sub_mode: Option<SubMode>,
}

impl StopMode {
    /// Pair a stop type with an optional sub-mode.
    #[must_use]
    pub const fn new(stop_type: Option<StopPlaceType>, sub_mode: Option<SubMode>) -> Self {
        Self {
            stop_type,
            sub_mode,
        }
    }
}
