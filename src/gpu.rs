// src/gpu.rs
// Single-owner GPU context and the texture handle registry.
// Every GPU resource is owned here and referenced elsewhere by a typed,
// non-owning handle whose validity is checked at lookup time; nothing else
// in the pipeline talks to wgpu. Workers never call in - GPU use stays on
// the thread that created the context.
// RELEVANT FILES:src/store.rs,src/pipeline.rs

use std::sync::Mutex;

use once_cell::sync::OnceCell;

use crate::error::{Error, Result};
use crate::framebuffer::Framebuffer;

/// Non-owning reference to a texture in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureHandle(u32);

pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    textures: Mutex<Vec<Option<wgpu::Texture>>>,
}

static CTX: OnceCell<GpuContext> = OnceCell::new();

impl GpuContext {
    /// The process-wide context, created on first use. Fails when no
    /// adapter is available (headless CI without a GPU).
    pub fn get() -> Result<&'static GpuContext> {
        CTX.get_or_try_init(|| {
            let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });

            let adapter = pollster::block_on(instance.request_adapter(
                &wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::LowPower,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                },
            ))
            .ok_or_else(|| Error::gpu("no suitable GPU adapter"))?;

            let (device, queue) = pollster::block_on(adapter.request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    label: Some("lightforge-device"),
                },
                None,
            ))
            .map_err(|e| Error::gpu(format!("request_device failed: {e}")))?;

            Ok(GpuContext {
                device,
                queue,
                textures: Mutex::new(Vec::new()),
            })
        })
    }

    /// Upload the baked atlas as an `Rgba32Float` texture and register it.
    pub fn upload_lightmap(&self, framebuffer: &Framebuffer) -> TextureHandle {
        let size = framebuffer.size();
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lightforge-lightmap"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(framebuffer.as_f32_slice()),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(16 * size),
                rows_per_image: Some(size),
            },
            wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
        );

        let mut textures = self.textures.lock().unwrap();
        textures.push(Some(texture));
        TextureHandle(textures.len() as u32 - 1)
    }

    /// Run `f` against the texture behind `handle`. Fails if the handle
    /// was never issued or its texture has been released.
    pub fn with_texture<R>(
        &self,
        handle: TextureHandle,
        f: impl FnOnce(&wgpu::Texture) -> R,
    ) -> Result<R> {
        let textures = self.textures.lock().unwrap();
        match textures.get(handle.0 as usize) {
            Some(Some(texture)) => Ok(f(texture)),
            _ => Err(Error::gpu(format!("stale texture handle {:?}", handle))),
        }
    }

    /// Destroy the texture behind `handle`; later lookups fail.
    pub fn release(&self, handle: TextureHandle) {
        let mut textures = self.textures.lock().unwrap();
        if let Some(slot) = textures.get_mut(handle.0 as usize) {
            *slot = None;
        }
    }
}
