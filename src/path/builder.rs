use std::fmt::Write as _;

/// Accumulates path data one command at a time. Used to express basic
/// shapes (rect, circle, line, ...) as path strings.
#[derive(Debug, Default, Clone)]
pub struct PathBuilder {
    data: String,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn command(&mut self, letter: char, params: &[f64]) -> &mut Self {
        self.data.push(letter);
        for (index, value) in params.iter().enumerate() {
            if index > 0 {
                self.data.push(',');
            }
            let _ = write!(self.data, "{value}");
        }
        self
    }

    pub fn absolute_move_to(&mut self, x: f64, y: f64) -> &mut Self {
        self.command('M', &[x, y])
    }

    pub fn relative_move_to(&mut self, x: f64, y: f64) -> &mut Self {
        self.command('m', &[x, y])
    }

    pub fn absolute_line_to(&mut self, x: f64, y: f64) -> &mut Self {
        self.command('L', &[x, y])
    }

    pub fn relative_line_to(&mut self, x: f64, y: f64) -> &mut Self {
        self.command('l', &[x, y])
    }

    pub fn absolute_horizontal_to(&mut self, x: f64) -> &mut Self {
        self.command('H', &[x])
    }

    pub fn relative_horizontal_to(&mut self, x: f64) -> &mut Self {
        self.command('h', &[x])
    }

    pub fn absolute_vertical_to(&mut self, y: f64) -> &mut Self {
        self.command('V', &[y])
    }

    pub fn relative_vertical_to(&mut self, y: f64) -> &mut Self {
        self.command('v', &[y])
    }

    #[allow(clippy::too_many_arguments)]
    pub fn absolute_arc_to(
        &mut self,
        rx: f64,
        ry: f64,
        rotation: f64,
        large_arc: bool,
        sweep: bool,
        x: f64,
        y: f64,
    ) -> &mut Self {
        self.command('A', &[rx, ry, rotation, flag(large_arc), flag(sweep), x, y])
    }

    #[allow(clippy::too_many_arguments)]
    pub fn relative_arc_to(
        &mut self,
        rx: f64,
        ry: f64,
        rotation: f64,
        large_arc: bool,
        sweep: bool,
        x: f64,
        y: f64,
    ) -> &mut Self {
        self.command('a', &[rx, ry, rotation, flag(large_arc), flag(sweep), x, y])
    }

    pub fn absolute_close(&mut self) -> &mut Self {
        self.command('Z', &[])
    }

    pub fn relative_close(&mut self) -> &mut Self {
        self.command('z', &[])
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn build(&self) -> String {
        self.data.clone()
    }
}

fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_rectangle_outline() {
        let mut builder = PathBuilder::new();
        builder
            .absolute_move_to(1.0, 2.0)
            .relative_horizontal_to(3.5)
            .relative_vertical_to(4.0)
            .relative_horizontal_to(-3.5)
            .relative_close();
        assert_eq!(builder.build(), "M1,2h3.5v4h-3.5z");
    }

    #[test]
    fn arc_flags_are_numeric() {
        let mut builder = PathBuilder::new();
        assert!(builder.is_empty());
        builder.relative_arc_to(2.0, 2.0, 0.0, true, false, 4.0, 0.0);
        assert_eq!(builder.build(), "a2,2,0,1,0,4,0");
    }
}
