//! Synthetic GRIB2 messages for tests.
//!
//! Fixtures are built, not checked in: a builder assembles a structurally
//! valid message byte by byte so individual tests can corrupt exactly the
//! field they are about.

/// Builds a minimal GRIB2 message: indicator, grid definition, data
/// representation, data section, end marker. Defaults describe a rotated
/// 2x2 grid; every field the decoder reads can be overridden.
pub struct Grib2MessageBuilder {
    grid_template: u16,
    payload_template: u16,
    ni: u32,
    nj: u32,
    first_lat_units: i32,
    first_lon_units: i32,
    d_lat_units: u32,
    d_lon_units: u32,
    scan_mode: u8,
    south_pole_lat_units: i32,
    south_pole_lon_units: i32,
    rotation_angle_units: i32,
    reference_value: f32,
    binary_scale: i16,
    decimal_scale: i16,
    local_use_len: Option<u32>,
    payload: Vec<u8>,
}

impl Grib2MessageBuilder {
    /// A rotated latitude/longitude grid of 2x2 points, 0.09 degree
    /// spacing, with the regional air-quality model's pole.
    pub fn rotated_2x2() -> Self {
        Self {
            grid_template: 1,
            payload_template: 40,
            ni: 2,
            nj: 2,
            first_lat_units: -32_000_000,
            first_lon_units: -39_500_000,
            d_lat_units: 90_000,
            d_lon_units: 90_000,
            scan_mode: 0x40,
            south_pole_lat_units: -31_758_312,
            south_pole_lon_units: -92_402_985,
            rotation_angle_units: 0,
            reference_value: 0.0,
            binary_scale: 0,
            decimal_scale: 0,
            local_use_len: None,
            payload: vec![0xA5; 16],
        }
    }

    pub fn grid_template(mut self, template: u16) -> Self {
        self.grid_template = template;
        self
    }

    pub fn payload_template(mut self, template: u16) -> Self {
        self.payload_template = template;
        self
    }

    pub fn scan_mode(mut self, scan_mode: u8) -> Self {
        self.scan_mode = scan_mode;
        self
    }

    pub fn scaling(mut self, reference: f32, binary: i16, decimal: i16) -> Self {
        self.reference_value = reference;
        self.binary_scale = binary;
        self.decimal_scale = decimal;
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Insert a local use section (kind 2) of the given total length
    /// between the grid definition and data representation sections.
    pub fn with_local_use_section(mut self, length: u32) -> Self {
        self.local_use_len = Some(length.max(6));
        self
    }

    /// The grid definition section alone, for section-level parsing tests.
    pub fn grid_definition_section(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.push(0); // source of grid definition
        body.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        body.push(0); // no optional point list
        body.push(0); // list interpretation
        body.extend_from_slice(&self.grid_template.to_be_bytes());

        // Earth shape and radii, not read by the decoder
        body.push(6);
        body.push(0);
        body.extend_from_slice(&0u32.to_be_bytes());
        body.push(0);
        body.extend_from_slice(&0u32.to_be_bytes());
        body.push(0);
        body.extend_from_slice(&0u32.to_be_bytes());

        body.extend_from_slice(&self.ni.to_be_bytes());
        body.extend_from_slice(&self.nj.to_be_bytes());
        body.extend_from_slice(&0u32.to_be_bytes()); // basic angle
        body.extend_from_slice(&0u32.to_be_bytes()); // subdivisions
        body.extend_from_slice(&self.first_lat_units.to_be_bytes());
        body.extend_from_slice(&self.first_lon_units.to_be_bytes());
        body.push(0x30); // resolution and component flags
        let last_lat = self.first_lat_units + (self.nj as i32 - 1) * self.d_lat_units as i32;
        let last_lon = self.first_lon_units + (self.ni as i32 - 1) * self.d_lon_units as i32;
        body.extend_from_slice(&last_lat.to_be_bytes());
        body.extend_from_slice(&last_lon.to_be_bytes());
        body.extend_from_slice(&self.d_lon_units.to_be_bytes());
        body.extend_from_slice(&self.d_lat_units.to_be_bytes());
        body.push(self.scan_mode);

        if self.grid_template != 0 {
            body.extend_from_slice(&self.south_pole_lat_units.to_be_bytes());
            body.extend_from_slice(&self.south_pole_lon_units.to_be_bytes());
            body.extend_from_slice(&self.rotation_angle_units.to_be_bytes());
        }

        section(3, &body)
    }

    fn data_representation_section(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        body.extend_from_slice(&self.payload_template.to_be_bytes());
        body.extend_from_slice(&self.reference_value.to_be_bytes());
        body.extend_from_slice(&self.binary_scale.to_be_bytes());
        body.extend_from_slice(&self.decimal_scale.to_be_bytes());
        body.extend_from_slice(&8u16.to_be_bytes()); // bits per value
        body.extend_from_slice(&0u16.to_be_bytes()); // original field type
        section(5, &body)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut msg = Vec::new();

        // Indicator section: magic, reserved, discipline, edition, length.
        msg.extend_from_slice(b"GRIB");
        msg.extend_from_slice(&[0, 0]);
        msg.push(0);
        msg.push(2);
        msg.extend_from_slice(&[0u8; 8]); // total length, patched below

        msg.extend_from_slice(&self.grid_definition_section());

        if let Some(len) = self.local_use_len {
            let mut local = Vec::with_capacity(len as usize);
            local.extend_from_slice(&len.to_be_bytes());
            local.push(2);
            local.resize(len as usize, 0xEE);
            msg.extend_from_slice(&local);
        }

        msg.extend_from_slice(&self.data_representation_section());
        msg.extend_from_slice(&section(7, &self.payload));
        msg.extend_from_slice(b"7777");

        let total = msg.len() as u64;
        msg[8..16].copy_from_slice(&total.to_be_bytes());
        msg
    }
}

fn section(kind: u8, body: &[u8]) -> Vec<u8> {
    let length = (body.len() + 5) as u32;
    let mut out = Vec::with_capacity(length as usize);
    out.extend_from_slice(&length.to_be_bytes());
    out.push(kind);
    out.extend_from_slice(body);
    out
}
