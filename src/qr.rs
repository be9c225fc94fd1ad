use qrcode::{EcLevel, QrCode};
use tiny_skia::{IntSize, Pixmap};

use crate::error::CardstockError;

// Black modules on white, quiet zone included, at a whole pixel-per-module
// scale.
#[derive(Debug, Clone)]
pub struct QrBitmap {
    side_px: u32,
    module_px: u32,
    modules: u32,
    quiet_modules: u32,
    pixmap: Pixmap,
}

impl QrBitmap {
    pub fn side_px(&self) -> u32 {
        self.side_px
    }

    pub fn module_px(&self) -> u32 {
        self.module_px
    }

    // Data modules per side, quiet zone excluded.
    pub fn modules(&self) -> u32 {
        self.modules
    }

    pub fn quiet_modules(&self) -> u32 {
        self.quiet_modules
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }
}

// EC level M. The symbol is scaled to the largest whole pixel-per-module
// factor that fits target_side_px; module_px clamps to 1, so a target
// smaller than the module count yields a side larger than the target.
pub fn encode(
    identifier: &str,
    target_side_px: u32,
    quiet_modules: u32,
) -> Result<QrBitmap, CardstockError> {
    let code = QrCode::with_error_correction_level(identifier, EcLevel::M)
        .map_err(|err| CardstockError::Render(format!("qr encode failed: {err}")))?;
    let modules = code.width() as u32;
    let colors = code.to_colors();

    let total_modules = modules + 2 * quiet_modules;
    let module_px = (target_side_px / total_modules.max(1)).max(1);
    let side_px = module_px * total_modules;

    let mut data = vec![0xFFu8; (side_px as usize) * (side_px as usize) * 4];
    for module_y in 0..modules {
        for module_x in 0..modules {
            let index = (module_y * modules + module_x) as usize;
            if colors[index] != qrcode::Color::Dark {
                continue;
            }
            let x0 = ((quiet_modules + module_x) * module_px) as usize;
            let y0 = ((quiet_modules + module_y) * module_px) as usize;
            for y in y0..y0 + module_px as usize {
                let row = y * side_px as usize * 4;
                for x in x0..x0 + module_px as usize {
                    let at = row + x * 4;
                    data[at] = 0;
                    data[at + 1] = 0;
                    data[at + 2] = 0;
                }
            }
        }
    }

    let size = IntSize::from_wh(side_px, side_px)
        .ok_or_else(|| CardstockError::Render("qr bitmap has zero size".to_string()))?;
    let pixmap = Pixmap::from_vec(data, size)
        .ok_or_else(|| CardstockError::Render("qr bitmap allocation failed".to_string()))?;

    Ok(QrBitmap {
        side_px,
        module_px,
        modules,
        quiet_modules,
        pixmap,
    })
}
