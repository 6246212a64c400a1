use crate::descriptor::{BufferDesc, ImageDesc};
use crate::resource::GraphResource;

#[macro_export]
macro_rules! render_graph_resource_interface {
    ($($res:ident => $res_desc:ty),+ $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
            pub struct $res;

            impl GraphResource for $res {
                type Descriptor = $res_desc;

                const TYPE: ResourceType = ResourceType::$res;

                fn wrap_descriptor(desc: Self::Descriptor) -> ResourceDescriptor {
                    ResourceDescriptor::$res(desc)
                }
            }
        )+

        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ResourceType {
            $(
                $res,
            )+
        }

        impl std::fmt::Display for ResourceType {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        ResourceType::$res => f.write_str(stringify!($res)),
                    )+
                }
            }
        }

        #[derive(Debug, Clone, PartialEq)]
        pub enum ResourceDescriptor {
            $(
                $res($res_desc),
            )+
        }

        impl ResourceDescriptor {
            pub fn resource_type(&self) -> ResourceType {
                match self {
                    $(
                        ResourceDescriptor::$res(_) => ResourceType::$res,
                    )+
                }
            }
        }
    };
}

render_graph_resource_interface!(
    Image => ImageDesc,
    Buffer => BufferDesc,
    UniformBuffer => BufferDesc,
);

impl ResourceDescriptor {
    pub fn name(&self) -> &str {
        match self {
            ResourceDescriptor::Image(desc) => &desc.name,
            ResourceDescriptor::Buffer(desc) | ResourceDescriptor::UniformBuffer(desc) => &desc.name,
        }
    }

    pub fn content_hash(&self) -> u64 {
        match self {
            ResourceDescriptor::Image(desc) => desc.content_hash(),
            // buckets are shared, the pool tells buffers and uniform buffers apart by type
            ResourceDescriptor::Buffer(desc) | ResourceDescriptor::UniformBuffer(desc) => desc.content_hash(),
        }
    }

    pub fn is_clear_on_create(&self) -> bool {
        match self {
            ResourceDescriptor::Image(desc) => desc.clear_mode.is_clear(),
            ResourceDescriptor::Buffer(desc) | ResourceDescriptor::UniformBuffer(desc) => desc.clear_mode.is_clear(),
        }
    }
}

/// Resources backed by a linear allocation.
pub trait BufferResource: GraphResource {}

impl BufferResource for Buffer {}
impl BufferResource for UniformBuffer {}
