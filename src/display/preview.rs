//! SDL2 preview window
//!
//! Presents the composed grid in a local window. Only compiled with
//! the `display` feature since headless nodes have no use for it.

use sdl2::event::Event;
use sdl2::keyboard::Keycode;
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, TextureCreator};
use sdl2::video::{Window, WindowContext};
use sdl2::EventPump;
use tracing::info;

use crate::display::compositor::CompositeImage;
use crate::error::DisplayError;

pub struct PreviewWindow {
    _context: sdl2::Sdl,
    canvas: Canvas<Window>,
    texture_creator: TextureCreator<WindowContext>,
    event_pump: EventPump,
}

impl PreviewWindow {
    pub fn open(title: &str, width: u32, height: u32) -> Result<Self, DisplayError> {
        let context = sdl2::init().map_err(DisplayError::Init)?;
        let video = context.video().map_err(DisplayError::Init)?;

        let window = video
            .window(title, width, height)
            .position_centered()
            .build()
            .map_err(|e| DisplayError::Init(e.to_string()))?;

        let canvas = window
            .into_canvas()
            .present_vsync()
            .build()
            .map_err(|e| DisplayError::Init(e.to_string()))?;
        let texture_creator = canvas.texture_creator();
        let event_pump = context.event_pump().map_err(DisplayError::Init)?;

        info!(title, width, height, "preview window opened");
        Ok(Self {
            _context: context,
            canvas,
            texture_creator,
            event_pump,
        })
    }

    pub fn render(&mut self, image: &CompositeImage) -> Result<(), DisplayError> {
        let mut texture = self
            .texture_creator
            .create_texture_streaming(PixelFormatEnum::RGB24, image.width, image.height)
            .map_err(|e| DisplayError::Render(e.to_string()))?;

        texture
            .update(None, &image.data, image.width as usize * 3)
            .map_err(|e| DisplayError::Render(e.to_string()))?;

        self.canvas.clear();
        self.canvas
            .copy(&texture, None, None)
            .map_err(DisplayError::Render)?;
        self.canvas.present();
        Ok(())
    }

    /// Drain pending window events. True means the user closed the
    /// window or hit escape.
    pub fn poll_quit(&mut self) -> bool {
        let mut quit = false;
        for event in self.event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => quit = true,
                Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => quit = true,
                _ => {}
            }
        }
        if quit {
            info!("preview window close requested");
        }
        quit
    }
}
