//! Identifiers and values of the sample catalog
//! (`services/sos-worker/testdata/catalog.yaml`).

/// Offerings of the sample catalog.
pub mod offerings {
    /// Depth at station 3.
    pub const DEPTH: &str = "offering-3";

    /// Composite depth and temperature at station 4.
    pub const AGGREGATE: &str = "offering-4";
}

/// Procedures of the sample catalog.
pub mod procedures {
    pub const ID_BASE: &str = "urn:ogc:object:sensor:GEOM:";
    pub const DEPTH: &str = "urn:ogc:object:sensor:GEOM:3";
    pub const AGGREGATE: &str = "urn:ogc:object:sensor:GEOM:4";

    /// First identifier handed out by RegisterSensor on the sample catalog.
    pub const NEXT: &str = "urn:ogc:object:sensor:GEOM:5";
}

/// Phenomena of the sample catalog.
pub mod phenomena {
    pub const DEPTH: &str = "urn:ogc:def:phenomenon:GEOM:depth";
    pub const TEMPERATURE: &str = "urn:ogc:def:phenomenon:GEOM:temperature";
    pub const AGGREGATE: &str = "urn:ogc:def:phenomenon:GEOM:aggregatePhenomenon";
}

/// Features of interest of the sample catalog.
pub mod features {
    pub const STATION_3: &str = "station-3";
    pub const STATION_4: &str = "station-4";

    /// Bounding box around station 3 only, as `minx,miny,maxx,maxy`.
    pub const BBOX_STATION_3: &str = "-5.0,48.0,-4.0,49.0";
}

/// Stored observations of the sample catalog.
pub mod observations {
    pub const DEPTH: &str = "urn:ogc:object:observation:GEOM:304";
    pub const AGGREGATE: &str = "urn:ogc:object:observation:GEOM:305";

    /// First identifier assigned to an inserted observation.
    pub const NEXT: &str = "urn:ogc:object:observation:GEOM:306";

    /// Times of the depth rows, every hour from 02:59.
    pub const DEPTH_TIMES: [&str; 5] = [
        "2007-05-01T02:59:00.0",
        "2007-05-01T03:59:00.0",
        "2007-05-01T04:59:00.0",
        "2007-05-01T05:59:00.0",
        "2007-05-01T06:59:00.0",
    ];

    pub const DEPTH_VALUE: f64 = 6.56;
}

/// A minimal SensorML 1.0.1 document.
pub const SENSOR_ML: &str =
    "<sml:SensorML version=\"1.0.1\"><sml:member><sml:System/></sml:member></sml:SensorML>";
