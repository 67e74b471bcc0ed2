//! Common test fixtures for the coastal snow tests.

/// Display tuples `(snow_now, snow_area_width, ice_now)` at the table ends.
pub mod display {
    /// At or below the lowest breakpoint (0.01 m).
    pub const NO_SNOW: (f32, f32, f32) = (1.2, 0.25, 2.0);

    /// At or above the highest breakpoint (0.25 m).
    pub const SATURATED: (f32, f32, f32) = (0.05, 0.33, 0.37);
}

/// Sample streams as produced by the GRIB to CSV converter.
pub mod csv {
    /// Header only, no records.
    pub const HEADER_ONLY: &str = "lon,lat,snod\n";

    /// A mix of accepted, zeroed, malformed and out-of-grid records.
    pub const MIXED: &str = "\
lon,lat,snod
0.0,0.0,0.5
10.0,0.0,9.99e-05
20.0,0.0,0.0004
broken line
30.0,120.0,0.7
40.0;0.0;0.25
";

    /// Records of [`MIXED`] that are used.
    pub const MIXED_ACCEPTED: usize = 4;
}
